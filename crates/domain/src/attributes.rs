//! Attribute key/value model
//!
//! Measurements and log records carry an ordered list of [`KeyValue`]
//! dimensions. Values are a small closed set of scalar types; anything else
//! is coerced to its string form (see [`AttributeValue::coerce`]).

use std::borrow::Cow;
use std::fmt;

use serde::Serialize;

/// Reserved key for the deployment environment
pub const ENV_KEY: &str = "env";
/// Reserved key for the application version
pub const VERSION_KEY: &str = "version";
/// Reserved key for the host name
pub const HOST_KEY: &str = "host";
/// Reserved key for the service name
pub const SERVICE_NAME_KEY: &str = "service.name";

/// Scalar attribute value
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum AttributeValue {
    String(String),
    I64(i64),
    F64(f64),
    Bool(bool),
}

impl AttributeValue {
    /// Coerce an arbitrary serializable value into an attribute value
    ///
    /// Scalars keep their type. Composite values (maps, sequences, structs)
    /// become their compact JSON text. Serialization failures fall back to
    /// an empty string rather than an error.
    pub fn coerce<T: Serialize + ?Sized>(value: &T) -> Self {
        match serde_json::to_value(value) {
            Ok(serde_json::Value::Bool(b)) => Self::Bool(b),
            Ok(serde_json::Value::String(s)) => Self::String(s),
            Ok(serde_json::Value::Number(n)) => {
                if let Some(i) = n.as_i64() {
                    Self::I64(i)
                } else if let Some(f) = n.as_f64() {
                    Self::F64(f)
                } else {
                    Self::String(n.to_string())
                }
            }
            Ok(serde_json::Value::Null) => Self::String("null".to_string()),
            Ok(other) => Self::String(other.to_string()),
            Err(_) => Self::String(String::new()),
        }
    }

    /// Borrow the value as a string slice, if it is a string
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(s) => f.write_str(s),
            Self::I64(i) => write!(f, "{i}"),
            Self::F64(v) => write!(f, "{v}"),
            Self::Bool(b) => write!(f, "{b}"),
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<&String> for AttributeValue {
    fn from(value: &String) -> Self {
        Self::String(value.clone())
    }
}

impl From<bool> for AttributeValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        Self::I64(value)
    }
}

impl From<i32> for AttributeValue {
    fn from(value: i32) -> Self {
        Self::I64(i64::from(value))
    }
}

impl From<u16> for AttributeValue {
    fn from(value: u16) -> Self {
        Self::I64(i64::from(value))
    }
}

impl From<u32> for AttributeValue {
    fn from(value: u32) -> Self {
        Self::I64(i64::from(value))
    }
}

impl From<u64> for AttributeValue {
    fn from(value: u64) -> Self {
        i64::try_from(value).map_or_else(|_| Self::String(value.to_string()), Self::I64)
    }
}

impl From<f64> for AttributeValue {
    fn from(value: f64) -> Self {
        Self::F64(value)
    }
}

/// A single attribute dimension
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KeyValue {
    pub key: Cow<'static, str>,
    pub value: AttributeValue,
}

impl KeyValue {
    /// Create a new key/value pair
    pub fn new(key: impl Into<Cow<'static, str>>, value: impl Into<AttributeValue>) -> Self {
        Self { key: key.into(), value: value.into() }
    }

    /// Create a pair from any serializable value, coercing non-scalars
    pub fn coerced<T: Serialize + ?Sized>(key: impl Into<Cow<'static, str>>, value: &T) -> Self {
        Self { key: key.into(), value: AttributeValue::coerce(value) }
    }
}
