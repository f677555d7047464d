//! Error types used throughout the application

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for telemetry bootstrap and configuration
///
/// Runtime measurement failures never surface through this type; they are
/// recovered inside the emission path. Only process-start problems do.
#[derive(Error, Debug, Serialize, Deserialize)]
#[serde(tag = "type", content = "message")]
pub enum TelemetryError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Sink unavailable: {0}")]
    SinkUnavailable(String),

    #[error("Logging initialization failed: {0}")]
    Logging(String),

    #[error("Telemetry already initialized")]
    AlreadyInitialized,
}

/// Result type alias for telemetry bootstrap operations
pub type Result<T> = std::result::Result<T, TelemetryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sink_unavailable_names_the_sink() {
        let err = TelemetryError::SinkUnavailable("log collector 10.0.0.5:4317".to_string());
        assert_eq!(err.to_string(), "Sink unavailable: log collector 10.0.0.5:4317");
    }

    #[test]
    fn test_serialized_variant_tags() {
        let tags: Vec<String> = [
            TelemetryError::Config("bad toml".to_string()),
            TelemetryError::SinkUnavailable("agent".to_string()),
            TelemetryError::Logging("already set".to_string()),
            TelemetryError::AlreadyInitialized,
        ]
        .iter()
        .map(|err| serde_json::to_value(err).unwrap()["type"].as_str().unwrap().to_owned())
        .collect();

        assert_eq!(tags, ["Config", "SinkUnavailable", "Logging", "AlreadyInitialized"]);
    }
}
