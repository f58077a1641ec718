//! # Layered Deep Merge
//!
//! Values files of a service instance are layered: `values.yaml`, then
//! `values-<env>.yaml`, then `values-<env>-<instance>.yaml`. Later layers
//! override earlier ones with the following rule:
//!
//! - when both sides hold a mapping for the same key, the mappings are
//!   merged recursively;
//! - in every other case (scalars, sequences, null, or a type change) the
//!   later value replaces the earlier one wholesale. Sequences are never
//!   concatenated.
//!
//! Keys present only in the later layer are added; keys present only in the
//! earlier layer are kept.

use serde_json::{Map, Value};

/// Merge `overlay` on top of `base` and return the result.
///
/// If both values are objects they are merged key by key, recursively.
/// Otherwise `overlay` wins outright.
pub fn deep_merge(base: Value, overlay: Value) -> Value {
    match (base, overlay) {
        (Value::Object(base), Value::Object(overlay)) => Value::Object(merge_maps(base, overlay)),
        (_, overlay) => overlay,
    }
}

fn merge_maps(mut base: Map<String, Value>, overlay: Map<String, Value>) -> Map<String, Value> {
    for (key, value) in overlay {
        let merged = match base.remove(&key) {
            Some(existing @ Value::Object(_)) if value.is_object() => deep_merge(existing, value),
            _ => value,
        };
        base.insert(key, merged);
    }
    base
}

/// Fold [`deep_merge`] left to right over `layers`, starting from an empty
/// mapping.
///
/// An empty iterator yields `{}`.
pub fn deep_merge_all<I>(layers: I) -> Value
where
    I: IntoIterator<Item = Value>,
{
    layers
        .into_iter()
        .fold(Value::Object(Map::new()), deep_merge)
}
