//! # Meterline Core
//!
//! Metrics registry, emission API and adapter pattern. No I/O.
//!
//! This crate contains:
//! - Port interfaces for metric and log backends (traits)
//! - The instrument registry (lazy, single-flight creation)
//! - Attribute enrichment with the process identity
//! - The `emit_count` / `emit_time` / `emit_gauge` API
//! - The operation observer pattern shared by every subsystem adapter
//!
//! ## Architecture Principles
//! - Only depends on `meterline-domain`
//! - Backends are reached exclusively through traits
//! - Emission never fails from the caller's point of view

pub mod context;
pub mod log_ports;
pub mod metrics;
pub mod observer;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub use context::EmitContext;
pub use log_ports::{LogRecord, LogSink, Severity};
pub use metrics::{
    enrich, AttributeEnricher, CounterHandle, GaugeHandle, HistogramHandle, Instrument,
    InstrumentKind, InstrumentRegistry, Metrics, MetricsError, MetricsResult, MetricsSink,
};
pub use observer::{ConnectionGauge, OperationObserver, OperationRecorder, OperationStart};
