//! Subscription registry.
//!
//! The authoritative client-side table mapping semantic keys to
//! server-assigned subscription ids, plus the per-key value cache. The
//! server is the sole source of truth: both maps are rebuilt wholesale from
//! every subscription snapshot and never mutated incrementally by the
//! client. The registry is owned by the client's shared state and mutated
//! only by the session loop; bindings get read-only access.

use std::collections::{BTreeMap, HashMap};

use liveupdate_core::wire::{ClientFrame, ServerFrame, SubscriptionEntry, ValueChange};
use liveupdate_core::{patch_value, PropertyKey};
use serde_json::Value;
use tracing::{debug, warn};

/// Build the subscribe frame for one object's batch of property paths.
#[must_use]
pub fn subscribe_frame(object_path: &str, property_paths: &[String]) -> ClientFrame {
    ClientFrame::Subscribe {
        object: object_path.to_string(),
        properties: property_paths.to_vec(),
    }
}

/// Client-side registry state: key↔id maps, value cache, last snapshot.
#[derive(Debug, Default)]
pub struct RegistryState {
    key_to_id: HashMap<String, u64>,
    id_to_key: HashMap<u64, String>,
    values: HashMap<String, Value>,
    entries: Vec<SubscriptionEntry>,
    last_error: Option<String>,
}

impl RegistryState {
    /// Empty registry; populated entirely by server snapshots.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one inbound server frame.
    pub fn apply(&mut self, frame: ServerFrame) {
        match frame {
            ServerFrame::Subscriptions(entries) => self.apply_snapshot(entries),
            ServerFrame::ValuesChanged(changes) => self.apply_value_changes(&changes),
            ServerFrame::Error(text) => self.note_error(text),
        }
    }

    /// Replace both maps from a full snapshot and purge cached values for
    /// keys no longer present. Values for keys still present are kept:
    /// stale-but-valid reads remain visible until the next update arrives.
    pub fn apply_snapshot(&mut self, entries: Vec<SubscriptionEntry>) {
        self.key_to_id.clear();
        self.id_to_key.clear();
        for entry in &entries {
            let key = entry.key().canonical();
            let _ = self.key_to_id.insert(key.clone(), entry.id);
            let _ = self.id_to_key.insert(entry.id, key);
        }
        self.values.retain(|key, _| self.key_to_id.contains_key(key));
        debug!(subscriptions = entries.len(), "applied subscription snapshot");
        self.entries = entries;
    }

    /// Apply a batch of value changes. Unknown ids are ignored; they belong
    /// to subscriptions that no longer exist (or never made it into a
    /// snapshot) and are not an error. Mapping values are patched one level
    /// deep over the prior cache entry.
    pub fn apply_value_changes(&mut self, changes: &[ValueChange]) {
        for change in changes {
            let Some(key) = self.id_to_key.get(&change.id) else {
                warn!(id = change.id, "value change for unknown subscription id");
                continue;
            };
            let patched = patch_value(self.values.get(key), change.value.clone());
            let _ = self.values.insert(key.clone(), patched);
        }
    }

    /// Record a server error message.
    ///
    /// The protocol's error frame carries no correlation id, so the error is
    /// attributable only to the most recent request round.
    pub fn note_error(&mut self, text: String) {
        warn!(error = %text, "live update server reported an error");
        self.last_error = Some(text);
    }

    /// Server id currently assigned to a key, if any.
    #[must_use]
    pub fn id_of(&self, key: &str) -> Option<u64> {
        self.key_to_id.get(key).copied()
    }

    /// Cached value for a key, if one has arrived.
    #[must_use]
    pub fn value_of(&self, key: &str) -> Option<Value> {
        self.values.get(key).cloned()
    }

    /// The most recent subscription snapshot.
    #[must_use]
    pub fn entries(&self) -> &[SubscriptionEntry] {
        &self.entries
    }

    /// All cached values by canonical key.
    #[must_use]
    pub fn values(&self) -> HashMap<String, Value> {
        self.values.clone()
    }

    /// The most recent server error text, if any.
    #[must_use]
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Resolve keys to ids and build one unsubscribe frame for the batch.
    ///
    /// Keys with no known id are silently skipped: they may never have been
    /// acknowledged, e.g. when the connection dropped before the snapshot
    /// arrived. Returns `None` when nothing resolved.
    #[must_use]
    pub fn unsubscribe_frame(&self, keys: &[String]) -> Option<ClientFrame> {
        let ids: Vec<u64> = keys.iter().filter_map(|k| self.id_of(k)).collect();
        if ids.is_empty() {
            return None;
        }
        Some(ClientFrame::Unsubscribe { ids })
    }

    /// Subscribe frames re-establishing every snapshotted key, grouped by
    /// object path. Indistinguishable from fresh subscribes on the wire;
    /// the server allocates fresh ids as needed. Frozen bindings are not
    /// covered because their keys left the snapshot when they unsubscribed.
    #[must_use]
    pub fn resync_frames(&self) -> Vec<ClientFrame> {
        let mut by_object: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for entry in &self.entries {
            by_object
                .entry(entry.object_path.clone())
                .or_default()
                .push(entry.property_path.clone());
        }
        by_object
            .into_iter()
            .map(|(object, properties)| ClientFrame::Subscribe { object, properties })
            .collect()
    }
}

/// Read-only view of registry state used by bindings.
pub trait RegistryRead {
    /// Server id for a canonical key.
    fn lookup_id(&self, key: &PropertyKey) -> Option<u64>;
    /// Cached value for a canonical key.
    fn lookup_value(&self, key: &PropertyKey) -> Option<Value>;
}

impl RegistryRead for RegistryState {
    fn lookup_id(&self, key: &PropertyKey) -> Option<u64> {
        self.id_of(&key.canonical())
    }

    fn lookup_value(&self, key: &PropertyKey) -> Option<Value> {
        self.value_of(&key.canonical())
    }
}
