//! Value patching for mapping-valued properties.
//!
//! Object-valued properties are patchable sub-documents: a `valuesChanged`
//! push may carry only the fields that changed. Patching is one level deep
//! on purpose — top-level fields are merged, nested mappings are replaced
//! wholesale, matching the property model's patch semantics.

use serde_json::Value;

/// Apply an incoming value on top of the prior cached value.
///
/// When both values are JSON objects, the incoming top-level fields are
/// merged over the prior ones and untouched fields survive. In every other
/// case (no prior value, or either side is not an object) the incoming
/// value replaces the prior one wholesale.
#[must_use]
pub fn patch_value(prior: Option<&Value>, incoming: Value) -> Value {
    match (prior, incoming) {
        (Some(Value::Object(prior_map)), Value::Object(incoming_map)) => {
            let mut merged = prior_map.clone();
            for (field, value) in incoming_map {
                let _ = merged.insert(field, value);
            }
            Value::Object(merged)
        }
        (_, incoming) => incoming,
    }
}
