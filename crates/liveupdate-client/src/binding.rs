//! Caller-facing property bindings.
//!
//! A [`Binding`] represents one caller's interest in one (object, property)
//! pair. Several bindings may share a key; the server's reference count —
//! never mirrored client-side — decides when the underlying subscription
//! actually goes away. Dropping a binding releases its interest, so
//! protocol correctness never depends on garbage collection timing.

use std::fmt;
use std::sync::Arc;

use liveupdate_core::PropertyKey;
use parking_lot::Mutex;
use serde_json::Value;
use tracing::debug;

use crate::client::ClientShared;
use crate::registry::RegistryRead;

/// Handle for one subscribed property.
pub struct Binding {
    name: String,
    key: PropertyKey,
    /// `Some(snapshot)` while frozen; the snapshot itself may be absent when
    /// the value had never resolved at freeze time.
    frozen: Mutex<Option<Option<Value>>>,
    shared: Arc<ClientShared>,
}

impl Binding {
    pub(crate) fn new(name: String, key: PropertyKey, shared: Arc<ClientShared>) -> Self {
        Self {
            name,
            key,
            frozen: Mutex::new(None),
            shared,
        }
    }

    /// Caller-facing name of this binding.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The (object, property) key this binding tracks.
    #[must_use]
    pub fn key(&self) -> &PropertyKey {
        &self.key
    }

    /// Latest known value.
    ///
    /// Returns the frozen snapshot while frozen — even when the shared key
    /// keeps receiving updates for other bindings — and otherwise the
    /// registry's cached value as of the last processed inbound message.
    /// `None` means the value never resolved, e.g. an invalid property path.
    #[must_use]
    pub fn read(&self) -> Option<Value> {
        if let Some(snapshot) = self.frozen.lock().as_ref() {
            return snapshot.clone();
        }
        self.shared.registry().lookup_value(&self.key)
    }

    /// Write a value through this binding's subscription.
    ///
    /// Fire-and-forget: the authoritative new value arrives later via the
    /// normal value-change push. When the key currently has no server id
    /// (frozen out of the snapshot, never subscribed, or pending
    /// resubscribe) the write is a no-op — it is not queued or retried.
    pub fn write(&self, value: Value) {
        let id = self.shared.registry().lookup_id(&self.key);
        match id {
            Some(id) => self.shared.set_value(id, value),
            None => debug!(key = %self.key, "write ignored: no active subscription id"),
        }
    }

    /// Whether this binding is currently frozen.
    #[must_use]
    pub fn is_frozen(&self) -> bool {
        self.frozen.lock().is_some()
    }

    /// Suspend live updates, capturing the current value as a snapshot.
    ///
    /// Idempotent. Releases this binding's interest only; other bindings on
    /// the same key keep the subscription alive server-side.
    pub fn freeze(&self) {
        let mut frozen = self.frozen.lock();
        if frozen.is_some() {
            return;
        }
        *frozen = Some(self.shared.registry().lookup_value(&self.key));
        self.shared.send_unsubscribe(&[self.key.canonical()]);
    }

    /// Resume live updates, discarding the frozen snapshot.
    ///
    /// Idempotent. Re-issues a subscribe request for this key under its
    /// object path so the shared cache resumes tracking.
    pub fn thaw(&self) {
        let was_frozen = self.frozen.lock().take().is_some();
        if was_frozen {
            self.shared
                .send_subscribe(&self.key.object_path, &[self.key.property_path.clone()]);
        }
    }
}

impl Drop for Binding {
    fn drop(&mut self) {
        // Unconditional, regardless of freeze state; the server's reference
        // count decides whether the subscription actually goes away.
        self.shared.send_unsubscribe(&[self.key.canonical()]);
    }
}

impl fmt::Debug for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Binding")
            .field("name", &self.name)
            .field("key", &self.key.canonical())
            .field("frozen", &self.is_frozen())
            .finish()
    }
}
