//! Metrics sink port
//!
//! The backend is an opaque collaborator: it creates named instruments and
//! accepts measurements on them. Export, batching and transport are its own
//! business.

use std::fmt::{self, Debug};
use std::sync::Arc;

use meterline_domain::KeyValue;

use super::error::MetricsResult;
use crate::context::EmitContext;

/// Kind of instrument
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InstrumentKind {
    /// Monotonic sum (`add`)
    Counter,
    /// Distribution of durations in milliseconds (`record`)
    Histogram,
    /// Last-value level (`record`)
    Gauge,
}

impl InstrumentKind {
    /// Lowercase name of the kind
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Counter => "counter",
            Self::Histogram => "histogram",
            Self::Gauge => "gauge",
        }
    }
}

impl fmt::Display for InstrumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sink-side counter
pub trait CounterHandle: Send + Sync + Debug {
    /// Add `value` to the counter
    fn add(&self, ctx: &EmitContext, value: i64, attrs: &[KeyValue]);
}

/// Sink-side histogram
pub trait HistogramHandle: Send + Sync + Debug {
    /// Record one sample
    fn record(&self, ctx: &EmitContext, value: i64, attrs: &[KeyValue]);
}

/// Sink-side gauge
pub trait GaugeHandle: Send + Sync + Debug {
    /// Record the current level
    fn record(&self, ctx: &EmitContext, value: i64, attrs: &[KeyValue]);
}

/// Metrics backend able to create instruments
///
/// Creation may fail (invalid name, backend unavailable). Implementations
/// are not required to tolerate duplicate registrations; the registry makes
/// sure each name is created once.
pub trait MetricsSink: Send + Sync + Debug {
    /// Create a counter named `name`
    fn create_counter(&self, name: &str) -> MetricsResult<Arc<dyn CounterHandle>>;

    /// Create a histogram named `name`
    fn create_histogram(&self, name: &str) -> MetricsResult<Arc<dyn HistogramHandle>>;

    /// Create a gauge named `name`
    fn create_gauge(&self, name: &str) -> MetricsResult<Arc<dyn GaugeHandle>>;
}

/// A created instrument, as stored in the registry
#[derive(Debug, Clone)]
pub enum Instrument {
    Counter(Arc<dyn CounterHandle>),
    Histogram(Arc<dyn HistogramHandle>),
    Gauge(Arc<dyn GaugeHandle>),
}

impl Instrument {
    /// Kind of this instrument
    pub const fn kind(&self) -> InstrumentKind {
        match self {
            Self::Counter(_) => InstrumentKind::Counter,
            Self::Histogram(_) => InstrumentKind::Histogram,
            Self::Gauge(_) => InstrumentKind::Gauge,
        }
    }

    /// Whether both values point at the same sink-side instrument
    pub fn same_instrument(&self, other: &Self) -> bool {
        self.data_ptr() == other.data_ptr()
    }

    /// Forward a measurement to the sink using the kind's operation
    pub fn submit(&self, ctx: &EmitContext, value: i64, attrs: &[KeyValue]) {
        match self {
            Self::Counter(counter) => counter.add(ctx, value, attrs),
            Self::Histogram(histogram) => histogram.record(ctx, value, attrs),
            Self::Gauge(gauge) => gauge.record(ctx, value, attrs),
        }
    }

    fn data_ptr(&self) -> *const () {
        match self {
            Self::Counter(h) => Arc::as_ptr(h).cast::<()>(),
            Self::Histogram(h) => Arc::as_ptr(h).cast::<()>(),
            Self::Gauge(h) => Arc::as_ptr(h).cast::<()>(),
        }
    }
}
