//! Process identity
//!
//! The four dimensions attached to every measurement and log record. Built
//! once at startup and shared read-only for the rest of the process.

use serde::{Deserialize, Serialize};

use crate::config::TelemetryConfig;

/// Service name, version, environment and host of the running process
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessIdentity {
    /// Normalized application name (safe as a metric-name prefix)
    pub service_name: String,
    /// Application version
    pub version: String,
    /// Deployment environment label
    pub environment: String,
    /// Host the process runs on
    pub host_name: String,
}

impl ProcessIdentity {
    /// Build an identity, normalizing the service name
    pub fn new(
        service_name: impl AsRef<str>,
        version: impl Into<String>,
        environment: impl Into<String>,
        host_name: impl Into<String>,
    ) -> Self {
        Self {
            service_name: normalize_app_name(service_name.as_ref()),
            version: version.into(),
            environment: environment.into(),
            host_name: host_name.into(),
        }
    }

    /// Build an identity from configuration and a resolved host name
    ///
    /// The configured `host_name` override wins over `detected_host`.
    pub fn from_config(config: &TelemetryConfig, detected_host: impl Into<String>) -> Self {
        let host_name = config.host_name.clone().unwrap_or_else(|| detected_host.into());
        Self::new(&config.app_name, config.version.clone(), config.env.clone(), host_name)
    }
}

/// Replace every non-alphanumeric character with `_`
///
/// Metric backends restrict the characters allowed in instrument names, so
/// `billing-api.v2` becomes `billing_api_v2`.
pub fn normalize_app_name(app_name: &str) -> String {
    app_name.chars().map(|c| if c.is_ascii_alphanumeric() { c } else { '_' }).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_replaces_separators() {
        assert_eq!(normalize_app_name("billing-api"), "billing_api");
        assert_eq!(normalize_app_name("billing-api.v2"), "billing_api_v2");
        assert_eq!(normalize_app_name("already_ok_01"), "already_ok_01");
        assert_eq!(normalize_app_name(""), "");
    }

    #[test]
    fn test_new_normalizes_service_name() {
        let identity = ProcessIdentity::new("order-svc", "1.2.0", "prod", "web-01");
        assert_eq!(identity.service_name, "order_svc");
        // Host names are reported verbatim
        assert_eq!(identity.host_name, "web-01");
    }

    #[test]
    fn test_from_config_prefers_override() {
        let config = TelemetryConfig {
            app_name: "order-svc".to_string(),
            host_name: Some("pinned-host".to_string()),
            ..Default::default()
        };
        let identity = ProcessIdentity::from_config(&config, "detected-host");
        assert_eq!(identity.host_name, "pinned-host");

        let config = TelemetryConfig { host_name: None, ..config };
        let identity = ProcessIdentity::from_config(&config, "detected-host");
        assert_eq!(identity.host_name, "detected-host");
    }
}
