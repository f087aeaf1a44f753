//! Normalizing arbitrary error values into a common shape.
//!
//! Callers hand the logger whatever they have: a typed error, an anyhow
//! error, a string, a serializable payload, or some JSON scalar. [`RawError`]
//! is the normalized form, and [`extract_details`] turns it into
//! [`ErrorDetails`] without ever failing.

use crate::types::{ErrorCode, ErrorDetails};
use serde::Serialize;
use serde_json::{json, Map, Value};

/// An error value as captured, before classification.
#[derive(Debug, Clone, PartialEq)]
pub enum RawError {
    /// A typed error: name plus message, optionally with stack, code and
    /// cause chain.
    Typed {
        name: String,
        message: String,
        stack: Option<String>,
        code: Option<ErrorCode>,
        cause: Option<Value>,
    },
    /// A bare string used as an error.
    Text(String),
    /// A structured payload (JSON object or array).
    Structured(Value),
    /// Anything else: a scalar or null, kept as its rendered form.
    Other { type_name: String, display: String },
}

impl RawError {
    /// Capture a typed error with an explicit name and message.
    pub fn named(name: impl Into<String>, message: impl Into<String>) -> Self {
        RawError::Typed {
            name: name.into(),
            message: message.into(),
            stack: None,
            code: None,
            cause: None,
        }
    }

    /// Capture any `std::error::Error`, walking its source chain into the
    /// cause. The name is the error's type name without its module path.
    pub fn from_error<E: std::error::Error + ?Sized>(err: &E) -> Self {
        let mut chain = Vec::new();
        let mut source = err.source();
        while let Some(cause) = source {
            chain.push(Value::String(cause.to_string()));
            source = cause.source();
        }
        RawError::Typed {
            name: short_type_name::<E>().to_string(),
            message: err.to_string(),
            stack: None,
            code: None,
            cause: if chain.is_empty() {
                None
            } else {
                Some(Value::Array(chain))
            },
        }
    }

    /// Capture a serializable payload. If serialization itself fails, a
    /// placeholder object naming the type and the failure is kept instead,
    /// so capture stays total.
    pub fn structured<T: Serialize + ?Sized>(value: &T) -> Self {
        match serde_json::to_value(value) {
            Ok(v) => RawError::from(v),
            Err(e) => RawError::Structured(json!({
                "unserializable": short_type_name::<T>(),
                "reason": e.to_string(),
            })),
        }
    }

    /// Attach a machine-readable code. Only meaningful on typed errors;
    /// other shapes are returned unchanged.
    pub fn with_code(mut self, new_code: ErrorCode) -> Self {
        if let RawError::Typed { code, .. } = &mut self {
            *code = Some(new_code);
        }
        self
    }

    /// Attach a stack trace. Only meaningful on typed errors; other shapes
    /// are returned unchanged.
    pub fn with_stack(mut self, new_stack: impl Into<String>) -> Self {
        if let RawError::Typed { stack, .. } = &mut self {
            *stack = Some(new_stack.into());
        }
        self
    }
}

impl From<String> for RawError {
    fn from(message: String) -> Self {
        RawError::Text(message)
    }
}

impl From<&str> for RawError {
    fn from(message: &str) -> Self {
        RawError::Text(message.to_string())
    }
}

impl From<anyhow::Error> for RawError {
    fn from(err: anyhow::Error) -> Self {
        let chain: Vec<Value> = err
            .chain()
            .skip(1)
            .map(|cause| Value::String(cause.to_string()))
            .collect();
        RawError::Typed {
            name: "Error".to_string(),
            message: err.to_string(),
            stack: None,
            code: None,
            cause: if chain.is_empty() {
                None
            } else {
                Some(Value::Array(chain))
            },
        }
    }
}

impl From<Value> for RawError {
    fn from(value: Value) -> Self {
        match value {
            Value::String(s) => RawError::Text(s),
            Value::Object(_) | Value::Array(_) => RawError::Structured(value),
            Value::Null => RawError::Other {
                type_name: "null".to_string(),
                display: "null".to_string(),
            },
            Value::Bool(b) => RawError::Other {
                type_name: "boolean".to_string(),
                display: b.to_string(),
            },
            Value::Number(n) => RawError::Other {
                type_name: "number".to_string(),
                display: n.to_string(),
            },
        }
    }
}

/// Turn a captured error into storable details. Total over every shape:
/// the message is never empty and `metadata.type` always names the
/// originating kind.
pub fn extract_details(raw: &RawError) -> ErrorDetails {
    match raw {
        RawError::Typed {
            name,
            message,
            stack,
            code,
            cause,
        } => {
            let mut metadata = Map::new();
            metadata.insert("type".to_string(), Value::String(name.clone()));
            ErrorDetails {
                message: message.clone(),
                stack: stack.clone(),
                code: code.clone(),
                name: Some(name.clone()),
                cause: cause.clone(),
                metadata: Some(metadata),
            }
        }
        RawError::Text(text) => {
            let mut metadata = Map::new();
            metadata.insert("type".to_string(), Value::String("string".to_string()));
            ErrorDetails {
                message: text.clone(),
                metadata: Some(metadata),
                ..Default::default()
            }
        }
        RawError::Structured(value) => {
            let keys: Vec<Value> = match value {
                Value::Object(map) => map.keys().cloned().map(Value::String).collect(),
                Value::Array(items) => {
                    (0..items.len()).map(|i| Value::String(i.to_string())).collect()
                }
                _ => Vec::new(),
            };
            let stringified = serde_json::to_string(value)
                .unwrap_or_else(|_| "<unserializable>".to_string());
            let mut metadata = Map::new();
            metadata.insert("type".to_string(), Value::String("object".to_string()));
            metadata.insert("keys".to_string(), Value::Array(keys));
            metadata.insert("stringified".to_string(), Value::String(stringified));
            ErrorDetails {
                message: "Unknown error object".to_string(),
                metadata: Some(metadata),
                ..Default::default()
            }
        }
        RawError::Other { type_name, display } => {
            let mut metadata = Map::new();
            metadata.insert("type".to_string(), Value::String(type_name.clone()));
            ErrorDetails {
                message: format!("Unknown error: {}", display),
                metadata: Some(metadata),
                ..Default::default()
            }
        }
    }
}

fn short_type_name<T: ?Sized>() -> &'static str {
    let full = std::any::type_name::<T>();
    full.rsplit("::").next().unwrap_or(full)
}
