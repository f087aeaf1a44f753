//! Stripping secrets from error payloads before they leave the process.
//!
//! Error causes and caller-supplied context metadata are arbitrary JSON and
//! routinely carry request bodies or config fragments. Any key containing
//! one of the sensitive substrings is removed, recursively, before a record
//! is queued. Capture-generated details metadata is left alone: it holds
//! the type tag and the `keys` listing, not caller data.

use crate::types::ErrorRecord;
use serde_json::Value;

/// Key substrings that mark a value as sensitive, matched case-insensitively.
pub const SENSITIVE_KEYS: [&str; 5] = ["password", "token", "secret", "key", "auth"];

fn is_sensitive(key: &str) -> bool {
    let key = key.to_lowercase();
    SENSITIVE_KEYS.iter().any(|s| key.contains(s))
}

/// Remove sensitive keys from a JSON value, recursing into nested objects
/// and arrays. Scalars pass through unchanged.
pub fn sanitize_value(value: &mut Value) {
    match value {
        Value::Object(map) => {
            map.retain(|key, _| !is_sensitive(key));
            for nested in map.values_mut() {
                sanitize_value(nested);
            }
        }
        Value::Array(items) => {
            for item in items {
                sanitize_value(item);
            }
        }
        _ => {}
    }
}

/// Sanitize the caller-provided parts of a record: the error cause and the
/// context metadata.
pub fn sanitize_record(record: &mut ErrorRecord) {
    if let Some(cause) = &mut record.details.cause {
        sanitize_value(cause);
    }
    if let Some(metadata) = &mut record.context.metadata {
        metadata.retain(|key, _| !is_sensitive(key));
        for nested in metadata.values_mut() {
            sanitize_value(nested);
        }
    }
}
