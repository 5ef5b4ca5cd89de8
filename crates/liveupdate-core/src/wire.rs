//! Wire protocol frames.
//!
//! The live update server speaks single-object JSON frames over a duplex
//! text channel. Frames are externally tagged by their one top-level field,
//! which maps directly onto serde's default enum representation:
//!
//! - Client → server: `{"subscribe":{..}}`, `{"unsubscribe":{..}}`, `{"set":[..]}`
//! - Server → client: `{"subscriptions":[..]}`, `{"valuesChanged":[..]}`, `{"error":".."}`
//!
//! The `subscriptions` frame is always a full snapshot of the server's
//! current subscription table, never a delta.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::key::PropertyKey;

/// One entry of a server subscription snapshot.
///
/// The server is the sole allocator of ids; ids are unique for as long as
/// the subscription exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionEntry {
    /// Server-assigned subscription id.
    pub id: u64,
    /// Object path of the subscribed property.
    pub object_path: String,
    /// Property path on the object.
    pub property_path: String,
}

impl SubscriptionEntry {
    /// The semantic key this entry maps to.
    #[must_use]
    pub fn key(&self) -> PropertyKey {
        PropertyKey::new(self.object_path.clone(), self.property_path.clone())
    }
}

/// One (id, value) pair of a `valuesChanged` batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueChange {
    /// Subscription id the value belongs to.
    pub id: u64,
    /// New (possibly partial) value.
    pub value: Value,
}

/// One (id, value) pair of an outbound `set` batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetValue {
    /// Subscription id to write through.
    pub id: u64,
    /// Value to write.
    pub value: Value,
}

/// Frames sent from the client to the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ClientFrame {
    /// Declare interest in a batch of properties of one object.
    Subscribe {
        /// Object path the properties belong to.
        object: String,
        /// Property paths to subscribe, batched per object.
        properties: Vec<String>,
    },
    /// Release interest in a batch of subscription ids.
    Unsubscribe {
        /// Server-assigned ids to release.
        ids: Vec<u64>,
    },
    /// Fire-and-forget value writes; the authoritative new value arrives
    /// later via a `valuesChanged` push.
    Set(Vec<SetValue>),
}

/// Frames pushed from the server to the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ServerFrame {
    /// Full subscription snapshot, superseding any prior snapshot.
    Subscriptions(Vec<SubscriptionEntry>),
    /// Batch of value updates.
    ValuesChanged(Vec<ValueChange>),
    /// Diagnostic text for a failed request. Carries no correlation id, so
    /// it cannot be attributed to a specific in-flight request.
    Error(String),
}

impl ServerFrame {
    /// Parse an inbound text frame.
    ///
    /// # Errors
    ///
    /// Returns the underlying JSON error for malformed frames; callers log
    /// and drop these rather than treating them as fatal.
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

impl ClientFrame {
    /// Encode for the wire.
    ///
    /// # Errors
    ///
    /// Returns a JSON error when a `set` value cannot be serialized.
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
