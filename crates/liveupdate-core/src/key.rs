//! Property key identity.
//!
//! A subscription is addressed by an (object path, property path) pair. The
//! canonical string form `objectPath/propertyPath` is the identity used by
//! the registry's maps and the value cache.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identity of one remote property: an object path plus a property path.
///
/// Object paths may contain `:` (e.g. `screen2:surface_1`) but never `/`;
/// property paths are dotted (e.g. `object.offset`). Immutable once a
/// binding holds it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PropertyKey {
    /// Path of the remote object, e.g. `screen2:surface_1`.
    pub object_path: String,
    /// Path of the property on that object, e.g. `object.offset`.
    pub property_path: String,
}

impl PropertyKey {
    /// Create a key from its two parts.
    pub fn new(object_path: impl Into<String>, property_path: impl Into<String>) -> Self {
        Self {
            object_path: object_path.into(),
            property_path: property_path.into(),
        }
    }

    /// The canonical cache identity, `objectPath/propertyPath`.
    #[must_use]
    pub fn canonical(&self) -> String {
        format!("{}/{}", self.object_path, self.property_path)
    }
}

impl fmt::Display for PropertyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.object_path, self.property_path)
    }
}
