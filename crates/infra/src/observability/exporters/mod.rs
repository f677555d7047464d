//! Metrics and log exporters

pub mod dogstatsd;
pub mod log_lines;

pub use dogstatsd::{DogStatsdSink, DEFAULT_AGENT_ADDR};
pub use log_lines::JsonLinesLogSink;
