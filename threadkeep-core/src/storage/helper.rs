//! Shared constants and utilities for storage implementations

use chrono::Utc;
use serde_json::{Map, Value};

/// Mime type recorded for payloads uploaded without one
pub const DEFAULT_MIME: &str = "application/octet-stream";

/// Current UTC time as ISO-8601 with microseconds and a trailing `Z`
pub fn iso_timestamp() -> String {
    Utc::now().format("%Y-%m-%dT%H:%M:%S%.6fZ").to_string()
}

/// Decode a JSON column that may hold either a JSON value or JSON text.
///
/// SQLite hands JSON back as text while other engines return structured
/// values; text that does not parse is kept as a plain string.
pub fn json_column(value: Value) -> Value {
    match value {
        Value::String(text) => serde_json::from_str(&text).unwrap_or(Value::String(text)),
        other => other,
    }
}

/// Like [`json_column`] but only accepts objects; anything else is empty.
pub fn json_object_column(value: Value) -> Map<String, Value> {
    match json_column(value) {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}
