//! In-memory sinks for tests
//!
//! - **[`InMemorySink`]**: a [`MetricsSink`](crate::metrics::MetricsSink)
//!   recording every creation call and measurement, with failure injection
//! - **[`InMemoryLogSink`]**: a [`LogSink`](crate::log_ports::LogSink)
//!   collecting records
//!
//! Both are cheap to clone; clones share state, so a test keeps one copy
//! for assertions and hands another to the code under test.

// Test doubles; panics here only ever fail the test that caused them
#![allow(clippy::missing_panics_doc)]

mod log_sink;
mod sink;

pub use log_sink::InMemoryLogSink;
pub use sink::{InMemorySink, Measurement};
