//! # Meterline Infrastructure
//!
//! Implementations of the ports defined in `meterline-core`.
//!
//! This crate contains:
//! - Configuration loading (environment, JSON, TOML)
//! - The DogStatsD metrics sink and the JSON-lines log exporter
//! - Global `tracing` subscriber setup and the log-sink bridge
//! - Process bootstrap ([`Telemetry`])
//! - Adapters for ORM, HTTP, TCP framework, key-value and document store
//!   clients
//!
//! ## Architecture
//! - Implements traits defined in `meterline-core`
//! - Depends on `meterline-domain` and `meterline-core`
//! - Contains all "impure" code (sockets, global subscriber, OS queries)

pub mod config;
pub mod instrumentation;
pub mod observability;
pub mod telemetry;

// Re-export commonly used items
pub use instrumentation::{
    CommandMonitor, HttpMetrics, HttpMetricsLayer, KvMetrics, OrmCommand, OrmMetrics, TcpMetrics,
};
pub use observability::{init_logging, DogStatsdSink, JsonLinesLogSink, LogBridgeLayer, Tracer};
pub use telemetry::{detect_host_name, Telemetry};
