use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use meterline_domain::{AttributeValue, KeyValue};
use parking_lot::Mutex;

use crate::context::EmitContext;
use crate::metrics::{
    CounterHandle, GaugeHandle, HistogramHandle, InstrumentKind, MetricsError, MetricsResult,
    MetricsSink,
};

/// One measurement captured by [`InMemorySink`]
#[derive(Debug, Clone, PartialEq)]
pub struct Measurement {
    /// Identifies the sink-side instrument that received it
    pub instrument_id: usize,
    pub kind: InstrumentKind,
    /// Full instrument name
    pub name: String,
    pub value: i64,
    /// Attributes after enrichment
    pub attributes: Vec<KeyValue>,
    /// Context passed with the measurement
    pub ctx: EmitContext,
}

impl Measurement {
    /// First attribute with `key`
    pub fn attribute(&self, key: &str) -> Option<&AttributeValue> {
        self.attributes.iter().find(|kv| kv.key == key).map(|kv| &kv.value)
    }

    /// Attribute keys in order
    pub fn keys(&self) -> Vec<&str> {
        self.attributes.iter().map(|kv| kv.key.as_ref()).collect()
    }
}

#[derive(Debug, Default)]
struct SinkState {
    created: Vec<(InstrumentKind, String)>,
    measurements: Vec<Measurement>,
    rejected: HashSet<String>,
    fail_remaining: usize,
    creation_delay: Duration,
}

#[derive(Debug, Default)]
struct SinkShared {
    state: Mutex<SinkState>,
    attempts: AtomicUsize,
    creating: AtomicUsize,
    max_creating: AtomicUsize,
}

/// Metrics sink keeping everything in memory
#[derive(Debug, Clone, Default)]
pub struct InMemorySink {
    shared: Arc<SinkShared>,
}

impl InMemorySink {
    /// Create an empty sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `n` creation calls fail with `SinkRejected`
    pub fn fail_next_creations(&self, n: usize) {
        self.shared.state.lock().fail_remaining = n;
    }

    /// Sleep for `delay` inside every creation call
    pub fn set_creation_delay(&self, delay: Duration) {
        self.shared.state.lock().creation_delay = delay;
    }

    /// Refuse to create instruments with this full name
    pub fn reject_name(&self, full_name: impl Into<String>) {
        self.shared.state.lock().rejected.insert(full_name.into());
    }

    /// Successful creations for `(kind, full_name)`
    pub fn creation_count(&self, kind: InstrumentKind, full_name: &str) -> usize {
        self.shared
            .state
            .lock()
            .created
            .iter()
            .filter(|(k, name)| *k == kind && name == full_name)
            .count()
    }

    /// Successful creations of any instrument
    pub fn total_creations(&self) -> usize {
        self.shared.state.lock().created.len()
    }

    /// Creation calls, failed ones included
    pub fn creation_attempts(&self) -> usize {
        self.shared.attempts.load(Ordering::SeqCst)
    }

    /// Highest number of creation calls observed running at once
    pub fn max_concurrent_creations(&self) -> usize {
        self.shared.max_creating.load(Ordering::SeqCst)
    }

    /// Every measurement received, in arrival order
    pub fn measurements(&self) -> Vec<Measurement> {
        self.shared.state.lock().measurements.clone()
    }

    /// Number of measurements received
    pub fn measurement_count(&self) -> usize {
        self.shared.state.lock().measurements.len()
    }

    /// Measurements for `full_name` of any kind
    pub fn measurements_named(&self, full_name: &str) -> Vec<Measurement> {
        self.shared
            .state
            .lock()
            .measurements
            .iter()
            .filter(|m| m.name == full_name)
            .cloned()
            .collect()
    }

    /// Sum of all counter increments for `full_name`
    pub fn counter_total(&self, full_name: &str) -> i64 {
        self.values(InstrumentKind::Counter, full_name).iter().sum()
    }

    /// Histogram samples for `full_name`, in arrival order
    pub fn histogram_samples(&self, full_name: &str) -> Vec<i64> {
        self.values(InstrumentKind::Histogram, full_name)
    }

    /// Gauge levels for `full_name`, in arrival order
    pub fn gauge_values(&self, full_name: &str) -> Vec<i64> {
        self.values(InstrumentKind::Gauge, full_name)
    }

    fn values(&self, kind: InstrumentKind, full_name: &str) -> Vec<i64> {
        self.shared
            .state
            .lock()
            .measurements
            .iter()
            .filter(|m| m.kind == kind && m.name == full_name)
            .map(|m| m.value)
            .collect()
    }

    fn create(&self, kind: InstrumentKind, name: &str) -> MetricsResult<Arc<MemoryInstrument>> {
        self.shared.attempts.fetch_add(1, Ordering::SeqCst);
        let creating = self.shared.creating.fetch_add(1, Ordering::SeqCst) + 1;
        self.shared.max_creating.fetch_max(creating, Ordering::SeqCst);

        let delay = self.shared.state.lock().creation_delay;
        if !delay.is_zero() {
            thread::sleep(delay);
        }

        let result = {
            let mut state = self.shared.state.lock();
            if state.rejected.contains(name) {
                Err(MetricsError::InvalidName {
                    name: name.to_owned(),
                    reason: "rejected by test sink",
                })
            } else if state.fail_remaining > 0 {
                state.fail_remaining -= 1;
                Err(MetricsError::SinkRejected {
                    name: name.to_owned(),
                    reason: "injected failure".to_owned(),
                })
            } else {
                let id = state.created.len();
                state.created.push((kind, name.to_owned()));
                Ok(Arc::new(MemoryInstrument {
                    id,
                    kind,
                    name: name.to_owned(),
                    shared: Arc::clone(&self.shared),
                }))
            }
        };

        self.shared.creating.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

impl MetricsSink for InMemorySink {
    fn create_counter(&self, name: &str) -> MetricsResult<Arc<dyn CounterHandle>> {
        let instrument: Arc<dyn CounterHandle> = self.create(InstrumentKind::Counter, name)?;
        Ok(instrument)
    }

    fn create_histogram(&self, name: &str) -> MetricsResult<Arc<dyn HistogramHandle>> {
        let instrument: Arc<dyn HistogramHandle> = self.create(InstrumentKind::Histogram, name)?;
        Ok(instrument)
    }

    fn create_gauge(&self, name: &str) -> MetricsResult<Arc<dyn GaugeHandle>> {
        let instrument: Arc<dyn GaugeHandle> = self.create(InstrumentKind::Gauge, name)?;
        Ok(instrument)
    }
}

#[derive(Debug)]
struct MemoryInstrument {
    id: usize,
    kind: InstrumentKind,
    name: String,
    shared: Arc<SinkShared>,
}

impl MemoryInstrument {
    fn push(&self, ctx: &EmitContext, value: i64, attrs: &[KeyValue]) {
        self.shared.state.lock().measurements.push(Measurement {
            instrument_id: self.id,
            kind: self.kind,
            name: self.name.clone(),
            value,
            attributes: attrs.to_vec(),
            ctx: *ctx,
        });
    }
}

impl CounterHandle for MemoryInstrument {
    fn add(&self, ctx: &EmitContext, value: i64, attrs: &[KeyValue]) {
        self.push(ctx, value, attrs);
    }
}

impl HistogramHandle for MemoryInstrument {
    fn record(&self, ctx: &EmitContext, value: i64, attrs: &[KeyValue]) {
        self.push(ctx, value, attrs);
    }
}

impl GaugeHandle for MemoryInstrument {
    fn record(&self, ctx: &EmitContext, value: i64, attrs: &[KeyValue]) {
        self.push(ctx, value, attrs);
    }
}
