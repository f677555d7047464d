//! Metrics core
//!
//! - `ports`: the sink abstraction (instrument creation + handles)
//! - `registry`: lazy, single-flight instrument creation
//! - `enrich`: process-identity attribute enrichment
//! - `emitter`: the `emit_count` / `emit_time` / `emit_gauge` API

pub mod emitter;
pub mod enrich;
pub mod error;
pub mod ports;
pub mod registry;

// Re-export metric types for convenience
pub use emitter::Metrics;
pub use enrich::{enrich, AttributeEnricher};
pub use error::{MetricsError, MetricsResult};
pub use ports::{
    CounterHandle, GaugeHandle, HistogramHandle, Instrument, InstrumentKind, MetricsSink,
};
pub use registry::InstrumentRegistry;
