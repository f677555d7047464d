//! Log sink port
//!
//! The logging bridge turns diagnostic events into [`LogRecord`]s and hands
//! them to a [`LogSink`]. Shipping, batching and retention belong to the
//! sink.

use std::fmt::{self, Debug};
use std::time::SystemTime;

use meterline_domain::{AttributeValue, KeyValue};

/// Log record severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl Severity {
    /// Uppercase severity text
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Trace => "TRACE",
            Self::Debug => "DEBUG",
            Self::Info => "INFO",
            Self::Warn => "WARN",
            Self::Error => "ERROR",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One structured log record
#[derive(Debug, Clone, PartialEq)]
pub struct LogRecord {
    pub timestamp: SystemTime,
    pub severity: Severity,
    /// Event message
    pub body: String,
    /// Module path or explicit target of the event
    pub target: String,
    /// Event fields followed by the identity dimensions
    pub attributes: Vec<KeyValue>,
}

impl LogRecord {
    /// First attribute with `key`
    pub fn attribute(&self, key: &str) -> Option<&AttributeValue> {
        self.attributes.iter().find(|kv| kv.key == key).map(|kv| &kv.value)
    }
}

/// Log backend
pub trait LogSink: Send + Sync + Debug {
    /// Accept one record; must not block for long
    fn emit(&self, record: LogRecord);

    /// Push buffered records out
    fn flush(&self) {}
}
