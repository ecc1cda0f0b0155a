//! Masking of per-run values so responses can be compared exactly
use serde_json::{Map, Value};

/// What identifier fields are replaced with by [`normalize_for_snapshot`].
pub const ID_PLACEHOLDER: &str = "[id]";

/// Recursively replace the value of every object key matching `predicate` with `placeholder`.
///
/// Masked values are not descended into. Arrays, scalars and non-matching keys keep their
/// structure.
pub fn mask_keys<P>(value: &Value, predicate: &P, placeholder: &Value) -> Value
where
    P: Fn(&str) -> bool,
{
    match value {
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|item| mask_keys(item, predicate, placeholder))
                .collect(),
        ),
        Value::Object(map) => {
            let masked: Map<String, Value> = map
                .iter()
                .map(|(key, inner)| {
                    let replaced = if predicate(key) {
                        placeholder.clone()
                    } else {
                        mask_keys(inner, predicate, placeholder)
                    };
                    (key.clone(), replaced)
                })
                .collect();
            Value::Object(masked)
        }
        scalar => scalar.clone(),
    }
}

/// True for any key containing "id", ignoring case (`id`, `_request_id`, `ID`, but also `width`).
pub fn is_id_key(key: &str) -> bool {
    key.to_lowercase().contains("id")
}

/// Mask every identifier-looking field with [`ID_PLACEHOLDER`].
pub fn normalize_for_snapshot(value: &Value) -> Value {
    mask_keys(value, &is_id_key, &Value::from(ID_PLACEHOLDER))
}
