//! Denormalize nested JSON into `(prefix, key, value)` rows.
//!
//! The analytics sheet stores every submission this way so that fields added
//! or renamed in later record versions still land somewhere readable, with
//! no change to the fixed-column primary schema.

use serde_json::{Map, Value};

/// Prefix used for top-level keys.
pub const ROOT_PREFIX: &str = "root";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlatEntry {
    /// Dotted path of the enclosing object, or [`ROOT_PREFIX`].
    pub prefix: String,
    pub key: String,
    pub value: String,
}

impl FlatEntry {
    pub fn as_tuple(&self) -> (&str, &str, &str) {
        (&self.prefix, &self.key, &self.value)
    }
}

/// Flatten a JSON object. Non-object input yields no entries.
///
/// Nested objects are walked recursively and produce no entry of their own;
/// arrays are leaves, rendered by joining their elements with `", "`.
pub fn flatten(value: &Value) -> Vec<FlatEntry> {
    let mut out = Vec::new();
    if let Value::Object(map) = value {
        walk(map, "", &mut out);
    }
    out
}

fn walk(map: &Map<String, Value>, prefix: &str, out: &mut Vec<FlatEntry>) {
    for (key, value) in map {
        match value {
            Value::Object(inner) => {
                let path = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{}.{}", prefix, key)
                };
                walk(inner, &path, out);
            }
            leaf => out.push(FlatEntry {
                prefix: if prefix.is_empty() {
                    ROOT_PREFIX.to_string()
                } else {
                    prefix.to_string()
                },
                key: key.clone(),
                value: stringify(leaf),
            }),
        }
    }
}

/// Render a JSON value as sheet cell text.
///
/// Strings are unquoted, `null` is empty, arrays are joined with `", "`, and
/// anything else is its JSON text.
pub fn stringify(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .map(stringify)
            .collect::<Vec<_>>()
            .join(", "),
        other => other.to_string(),
    }
}
