//! JSON helpers.

use serde_json::Value;
use std::collections::BTreeMap;

/// Flatten a nested JSON value into dotted leaf paths.
///
/// `{"a": {"b": 1, "c": 2}}` becomes `{"a.b": 1, "a.c": 2}`. Arrays and
/// scalars are leaves; an empty object flattens to nothing.
pub fn flatten(value: &Value, separator: &str) -> BTreeMap<String, Value> {
    let mut out = BTreeMap::new();
    flatten_into(value, separator, String::new(), &mut out);
    out
}

fn flatten_into(value: &Value, separator: &str, prefix: String, out: &mut BTreeMap<String, Value>) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                let path = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{}{}{}", prefix, separator, key)
                };
                flatten_into(child, separator, path, out);
            }
        }
        other => {
            if !prefix.is_empty() {
                out.insert(prefix, other.clone());
            }
        }
    }
}

/// Render a leaf value as a plain string (no quotes around strings).
pub fn leaf_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
