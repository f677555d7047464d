//! Observability infrastructure for metrics export, logging, and tracing
//!
//! - **[`exporters`]**: the DogStatsD metrics sink and the JSON-lines log
//!   exporter
//! - **[`logging`]**: global subscriber setup and the log-sink bridge
//! - **[`trace`]**: identity-tagged spans
//!
//! ## Error Handling
//!
//! Nothing in here fails an application request. Send errors are logged at
//! `warn` and the measurement is dropped; only startup (socket binding,
//! subscriber installation) returns errors.

pub mod exporters;
pub mod logging;
pub mod trace;

pub use exporters::{DogStatsdSink, JsonLinesLogSink};
pub use logging::{init_logging, LogBridgeLayer};
pub use trace::Tracer;
