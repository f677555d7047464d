//! Process bootstrap
//!
//! [`Telemetry::init`] runs once at process start:
//! 1. resolve the host name (config override, OS host name, `"unknown"`)
//! 2. build the process identity, normalizing the app name
//! 3. with `use_metrics`, connect the DogStatsD sink and open the gate
//! 4. with `use_logger`, install the global subscriber and the tracer, and
//!    bridge events to the JSON-lines exporter when `log_endpoint` is set
//!
//! A sink that cannot be reached at startup fails initialization. After
//! that, nothing in the pipeline returns errors to the application.
//! Call [`Telemetry::flush`] before exit to ship buffered log records.

use std::sync::Arc;

use meterline_core::{LogSink, Metrics, MetricsSink};
use meterline_domain::{ProcessIdentity, Result, TelemetryConfig, TelemetryError};

use crate::observability::{
    init_logging, DogStatsdSink, JsonLinesLogSink, LogBridgeLayer, Tracer,
};

/// Host name reported when the OS does not provide one
pub const UNKNOWN_HOST: &str = "unknown";

/// Initialized telemetry for one process
#[derive(Debug, Clone)]
pub struct Telemetry {
    config: TelemetryConfig,
    identity: Arc<ProcessIdentity>,
    metrics: Metrics,
    tracer: Option<Tracer>,
    log_sink: Option<Arc<dyn LogSink>>,
}

impl Telemetry {
    /// Initialize from `config`
    ///
    /// # Errors
    /// - `TelemetryError::SinkUnavailable` if the metrics agent or log
    ///   collector address cannot be resolved, or a local socket cannot be
    ///   bound
    /// - `TelemetryError::Logging` if a global subscriber is already set
    pub fn init(config: TelemetryConfig) -> Result<Self> {
        Self::init_with(config, |_| {})
    }

    /// Initialize after letting `customize` adjust the configuration
    ///
    /// # Errors
    /// See [`Telemetry::init`].
    pub fn init_with(
        mut config: TelemetryConfig,
        customize: impl FnOnce(&mut TelemetryConfig),
    ) -> Result<Self> {
        customize(&mut config);

        let metrics_sink: Option<Arc<dyn MetricsSink>> = if config.use_metrics {
            let sink = DogStatsdSink::connect(&config.metrics_endpoint).map_err(|e| {
                let endpoint = &config.metrics_endpoint;
                TelemetryError::SinkUnavailable(format!("metrics agent {endpoint}: {e}"))
            })?;
            Some(Arc::new(sink))
        } else {
            None
        };

        let endpoint = config.log_endpoint.trim();
        let log_sink: Option<Arc<dyn LogSink>> = if config.use_logger && !endpoint.is_empty() {
            let sink = JsonLinesLogSink::connect(endpoint).map_err(|e| {
                TelemetryError::SinkUnavailable(format!("log collector {endpoint}: {e}"))
            })?;
            Some(Arc::new(sink))
        } else {
            None
        };

        Self::with_sinks(config, metrics_sink, log_sink)
    }

    /// Initialize with caller-provided sinks
    ///
    /// The metrics gate opens only when `use_metrics` is set and a metrics
    /// sink is given. With `use_logger`, the global subscriber is installed
    /// and events are bridged to `log_sink` when one is given.
    ///
    /// # Errors
    /// Returns `TelemetryError::Logging` if a global subscriber is already
    /// set.
    pub fn with_sinks(
        config: TelemetryConfig,
        metrics_sink: Option<Arc<dyn MetricsSink>>,
        log_sink: Option<Arc<dyn LogSink>>,
    ) -> Result<Self> {
        let identity = Arc::new(ProcessIdentity::from_config(&config, detect_host_name()));

        let metrics = Metrics::uninitialized();
        if config.use_metrics {
            if let Some(sink) = metrics_sink {
                metrics.install(sink, Arc::clone(&identity))?;
            }
        }

        let log_sink = log_sink.filter(|_| config.use_logger);
        let tracer = if config.use_logger {
            let bridge = log_sink
                .clone()
                .map(|sink| LogBridgeLayer::new(sink, Arc::clone(&identity)));
            init_logging(&config, bridge)?;
            Some(Tracer::new(Arc::clone(&identity)))
        } else {
            None
        };

        tracing::info!(
            service = %identity.service_name,
            env = %identity.environment,
            host = %identity.host_name,
            metrics = metrics.is_enabled(),
            logger = tracer.is_some(),
            log_export = log_sink.is_some(),
            "Telemetry initialized"
        );

        Ok(Self { config, identity, metrics, tracer, log_sink })
    }

    /// Emission handle to pass to adapters
    pub fn metrics(&self) -> Metrics {
        self.metrics.clone()
    }

    /// Identity attached to every measurement and log record
    pub fn identity(&self) -> Arc<ProcessIdentity> {
        Arc::clone(&self.identity)
    }

    /// Tracer, when the logger is enabled
    pub fn tracer(&self) -> Option<&Tracer> {
        self.tracer.as_ref()
    }

    /// Configuration after customization
    pub fn config(&self) -> &TelemetryConfig {
        &self.config
    }

    /// Push buffered log records to the log sink
    ///
    /// A no-op without a log sink. Safe to call repeatedly.
    pub fn flush(&self) {
        if let Some(sink) = &self.log_sink {
            sink.flush();
        }
    }
}

/// OS host name, or [`UNKNOWN_HOST`]
pub fn detect_host_name() -> String {
    sysinfo::System::host_name()
        .filter(|name| !name.trim().is_empty())
        .unwrap_or_else(|| UNKNOWN_HOST.to_string())
}

#[cfg(test)]
mod tests {
    use meterline_core::testing::{InMemoryLogSink, InMemorySink};
    use meterline_core::EmitContext;

    use super::*;

    fn config() -> TelemetryConfig {
        TelemetryConfig {
            app_name: "billing-api".to_string(),
            version: "3.1.0".to_string(),
            env: "prod".to_string(),
            host_name: Some("web-04".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_disabled_metrics_keep_gate_closed() {
        let sink = InMemorySink::new();
        let telemetry =
            Telemetry::with_sinks(config(), Some(Arc::new(sink.clone())), None).unwrap();

        assert!(!telemetry.metrics().is_enabled());
        telemetry.metrics().emit_count(&EmitContext::background(), "http", 1, &[]);
        assert_eq!(sink.measurement_count(), 0);
        assert!(telemetry.tracer().is_none());
    }

    #[test]
    fn test_enabled_metrics_reach_sink() {
        let sink = InMemorySink::new();
        let config = TelemetryConfig { use_metrics: true, ..config() };
        let telemetry = Telemetry::with_sinks(config, Some(Arc::new(sink.clone())), None).unwrap();

        telemetry.metrics().emit_count(&EmitContext::background(), "http", 2, &[]);
        assert_eq!(sink.counter_total("billing_api_http"), 2);
    }

    #[test]
    fn test_identity_uses_normalized_name_and_override() {
        let telemetry = Telemetry::with_sinks(config(), None, None).unwrap();

        let identity = telemetry.identity();
        assert_eq!(identity.service_name, "billing_api");
        assert_eq!(identity.host_name, "web-04");
        assert_eq!(identity.version, "3.1.0");
    }

    #[test]
    fn test_customization_runs_before_init() {
        let telemetry = Telemetry::init_with(config(), |config| {
            config.app_name = "billing-worker".to_string();
        })
        .unwrap();

        assert_eq!(telemetry.identity().service_name, "billing_worker");
        assert_eq!(telemetry.config().app_name, "billing-worker");
    }

    #[test]
    fn test_unresolvable_endpoint_is_fatal() {
        let config = TelemetryConfig {
            use_metrics: true,
            metrics_endpoint: "not an address".to_string(),
            ..config()
        };

        let err = Telemetry::init(config).unwrap_err();
        assert!(matches!(err, TelemetryError::SinkUnavailable(_)));
    }

    #[test]
    fn test_unresolvable_log_endpoint_is_fatal() {
        let config = TelemetryConfig {
            use_logger: true,
            log_endpoint: "not an address".to_string(),
            ..config()
        };

        let err = Telemetry::init(config).unwrap_err();
        assert!(matches!(
            err,
            TelemetryError::SinkUnavailable(msg) if msg.contains("log collector")
        ));
    }

    #[test]
    fn test_log_sink_ignored_without_logger() {
        let log_sink = InMemoryLogSink::new();
        let telemetry =
            Telemetry::with_sinks(config(), None, Some(Arc::new(log_sink.clone()))).unwrap();

        telemetry.flush();
        assert_eq!(log_sink.flush_count(), 0);
    }

    #[test]
    fn test_detected_host_is_never_empty() {
        assert!(!detect_host_name().is_empty());
    }
}
