//! Metrics error type

use std::io;

use super::ports::InstrumentKind;

/// Errors raised while creating instruments or delivering measurements
///
/// None of these reach business code: the emission path logs and drops.
/// They are returned by the registry and by sinks so the failure can be
/// classified and the next call can retry.
#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    /// The name is already registered under a different instrument kind
    #[error("Instrument '{name}' is registered as a {existing}, requested as a {requested}")]
    KindMismatch {
        /// Metric basename
        name: String,
        /// Kind stored in the registry
        existing: InstrumentKind,
        /// Kind the caller asked for
        requested: InstrumentKind,
    },

    /// The sink refused the name
    #[error("Invalid instrument name '{name}': {reason}")]
    InvalidName {
        /// Full instrument name
        name: String,
        /// Why it was rejected
        reason: &'static str,
    },

    /// The sink could not create the instrument right now
    #[error("Sink rejected instrument '{name}': {reason}")]
    SinkRejected {
        /// Full instrument name
        name: String,
        /// Sink-provided reason
        reason: String,
    },

    /// Network send failed
    #[error("Network send failed: {source}")]
    SendFailed {
        /// Underlying IO error
        #[from]
        source: io::Error,
    },
}

/// Result type for metrics operations
pub type MetricsResult<T> = Result<T, MetricsError>;
