//! Normalization of raw response text into well-formed documents.

use serde_json::{Map, Value};

/// Member name of the synthetic envelope wrapping non-document responses.
pub const WRAPPER_MEMBER: &str = "doc";

/// Parses `text` as a well-formed document (JSON object or array).
///
/// Returns `None` for anything else, including bare JSON scalars.
#[must_use]
pub fn parse_document(text: &str) -> Option<Value> {
    match serde_json::from_str::<Value>(text.trim()) {
        Ok(value @ (Value::Object(_) | Value::Array(_))) => Some(value),
        _ => None,
    }
}

/// Normalizes raw response text into a well-formed document.
///
/// Documents pass through; everything else is wrapped as `{"doc": "<trimmed text>"}`.
#[must_use]
pub fn normalize(text: &str) -> Value {
    parse_document(text).unwrap_or_else(|| wrap(text))
}

/// Wraps non-document text in the synthetic envelope.
#[must_use]
pub fn wrap(text: &str) -> Value {
    let mut map = Map::with_capacity(1);
    map.insert(WRAPPER_MEMBER.to_string(), Value::String(text.trim().to_string()));
    Value::Object(map)
}
