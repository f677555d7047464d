//! Process-wide logging setup
//!
//! [`init_logging`] installs the global `tracing` subscriber:
//! - an `EnvFilter` read from `RUST_LOG`, defaulting to `debug` for the
//!   `local` environment and `info` elsewhere
//! - a JSON formatter writing to stderr
//! - optionally the [`LogBridgeLayer`] feeding a log sink

pub mod bridge;

use meterline_domain::{Result, TelemetryConfig, TelemetryError};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

pub use bridge::{severity_for, LogBridgeLayer};

/// Default filter directive for `config`
pub fn default_directive(config: &TelemetryConfig) -> &'static str {
    if config.is_local() {
        "debug"
    } else {
        "info"
    }
}

/// Build the filter: `RUST_LOG` when set and valid, otherwise the default
pub fn env_filter(config: &TelemetryConfig) -> EnvFilter {
    let default_level = default_directive(config);
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Install the global subscriber
///
/// # Errors
/// Returns `TelemetryError::Logging` if a global subscriber is already set.
pub fn init_logging(config: &TelemetryConfig, bridge: Option<LogBridgeLayer>) -> Result<()> {
    let bridged = bridge.is_some();

    tracing_subscriber::registry()
        .with(env_filter(config))
        .with(
            fmt::layer()
                .json()
                .with_target(true)
                .with_current_span(true)
                .with_writer(std::io::stderr),
        )
        .with(bridge)
        .try_init()
        .map_err(|e| TelemetryError::Logging(e.to_string()))?;

    tracing::debug!(env = %config.env, bridged, "Logging initialized");
    Ok(())
}
