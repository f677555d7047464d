//! Telemetry configuration structures

use serde::{Deserialize, Serialize};

/// Default DogStatsD agent address
pub const DEFAULT_METRICS_ENDPOINT: &str = "127.0.0.1:8125";

/// Environment label that switches logging to debug verbosity
pub const LOCAL_ENV: &str = "local";

/// Process-wide telemetry settings, supplied once at startup
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Application identifier; normalized and used as the metric-name prefix
    pub app_name: String,
    /// Application version reported on every measurement
    pub version: String,
    /// Deployment environment label (e.g. `local`, `staging`, `prod`)
    pub env: String,
    /// Metrics agent address (`host:port`)
    pub metrics_endpoint: String,
    /// Log collector address (`host:port`); empty leaves records unexported
    pub log_endpoint: String,
    /// Whether the metrics pipeline is enabled
    pub use_metrics: bool,
    /// Whether the logging/tracing pipeline is enabled
    pub use_logger: bool,
    /// Host name override; the OS host name is used when absent
    pub host_name: Option<String>,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            app_name: "app".to_string(),
            version: "0.0.0".to_string(),
            env: LOCAL_ENV.to_string(),
            metrics_endpoint: DEFAULT_METRICS_ENDPOINT.to_string(),
            log_endpoint: String::new(),
            use_metrics: false,
            use_logger: false,
            host_name: None,
        }
    }
}

impl TelemetryConfig {
    /// Whether the environment label asks for verbose local logging
    pub fn is_local(&self) -> bool {
        self.env.eq_ignore_ascii_case(LOCAL_ENV)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_disables_pipelines() {
        let config = TelemetryConfig::default();
        assert!(!config.use_metrics);
        assert!(!config.use_logger);
        assert_eq!(config.metrics_endpoint, DEFAULT_METRICS_ENDPOINT);
        assert!(config.is_local());
    }

    #[test]
    fn test_partial_json_falls_back_to_defaults() {
        let config: TelemetryConfig =
            serde_json::from_str(r#"{"app_name":"billing-api","use_metrics":true}"#).unwrap();
        assert_eq!(config.app_name, "billing-api");
        assert!(config.use_metrics);
        assert_eq!(config.version, "0.0.0");
        assert_eq!(config.host_name, None);
    }

    #[test]
    fn test_is_local_ignores_case() {
        let config = TelemetryConfig { env: "LOCAL".to_string(), ..Default::default() };
        assert!(config.is_local());

        let config = TelemetryConfig { env: "prod".to_string(), ..Default::default() };
        assert!(!config.is_local());
    }
}
