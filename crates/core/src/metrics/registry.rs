//! Instrument registry
//!
//! Maps `(kind, basename)` to the instrument created for it. Instruments are
//! created lazily on first use and never removed. Each kind has its own
//! table, so an adapter can record a histogram and a counter under the same
//! basename (`http` time and `http` count). A gauge never shares a basename
//! with a counter or histogram; asking for one returns
//! [`MetricsError::KindMismatch`].
//!
//! ## Concurrency
//! - **Read path**: a `DashMap` lookup; no global lock once the instrument
//!   exists.
//! - **Creation path**: one `Mutex` per basename in an in-flight table. The
//!   first caller creates, later callers block on the same mutex and then
//!   find the stored instrument. At most one sink creation call is in flight
//!   per basename, and the kind check runs under the same mutex.
//! - **Failures are not cached**: when creation fails nothing is stored, so
//!   the next caller (including any waiter) retries.

use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;

use super::error::{MetricsError, MetricsResult};
use super::ports::{
    CounterHandle, GaugeHandle, HistogramHandle, Instrument, InstrumentKind, MetricsSink,
};

/// Created instruments of one kind
#[derive(Debug, Default)]
struct KindTable {
    instruments: DashMap<String, Instrument>,
}

/// Process-wide table of created instruments
#[derive(Debug)]
pub struct InstrumentRegistry {
    sink: Arc<dyn MetricsSink>,
    /// Prefix joined to every basename with `_`
    prefix: String,
    counters: KindTable,
    histograms: KindTable,
    gauges: KindTable,
    in_flight: DashMap<String, Arc<Mutex<()>>>,
}

impl InstrumentRegistry {
    /// Create an empty registry creating instruments on `sink`
    ///
    /// `prefix` is normally the normalized application name. An empty prefix
    /// uses basenames as-is.
    pub fn new(sink: Arc<dyn MetricsSink>, prefix: impl Into<String>) -> Self {
        Self {
            sink,
            prefix: prefix.into(),
            counters: KindTable::default(),
            histograms: KindTable::default(),
            gauges: KindTable::default(),
            in_flight: DashMap::new(),
        }
    }

    /// Resolve the instrument for `(kind, name)`, creating it on first use
    ///
    /// # Errors
    /// - `MetricsError::KindMismatch` if `name` is a gauge and a counter or
    ///   histogram is requested, or the reverse
    /// - whatever the sink returns when creation fails; nothing is cached on
    ///   failure and the next call tries again
    pub fn resolve(&self, kind: InstrumentKind, name: &str) -> MetricsResult<Instrument> {
        if let Some(found) = self.table(kind).instruments.get(name) {
            return Ok(found.value().clone());
        }

        let gate = {
            let entry =
                self.in_flight.entry(name.to_owned()).or_insert_with(|| Arc::new(Mutex::new(())));
            Arc::clone(entry.value())
        };
        let result = {
            let _creating = gate.lock();
            self.resolve_gated(kind, name)
        };

        // Last caller through the gate drops it; queued callers still hold a clone
        self.in_flight.remove_if(name, |_, current| {
            Arc::ptr_eq(current, &gate) && Arc::strong_count(current) == 2
        });

        result
    }

    /// Lookup, kind check and creation, with the basename gate held
    fn resolve_gated(&self, kind: InstrumentKind, name: &str) -> MetricsResult<Instrument> {
        let table = self.table(kind);

        // Another caller may have finished while we waited
        if let Some(found) = table.instruments.get(name) {
            return Ok(found.value().clone());
        }

        if let Some(existing) = self.conflicting_kind(kind, name) {
            return Err(self.mismatch(name, existing, kind));
        }

        let full_name = self.full_name(name);
        let instrument = match self.create(kind, &full_name) {
            Ok(instrument) => instrument,
            Err(e) => {
                tracing::warn!(
                    metric = %full_name,
                    kind = %kind,
                    error = %e,
                    "Instrument creation failed"
                );
                return Err(e);
            }
        };

        table.instruments.insert(name.to_owned(), instrument.clone());
        tracing::debug!(metric = %full_name, kind = %kind, "Created instrument");

        Ok(instrument)
    }

    /// Resolve a counter
    ///
    /// # Errors
    /// See [`InstrumentRegistry::resolve`].
    pub fn counter(&self, name: &str) -> MetricsResult<Arc<dyn CounterHandle>> {
        match self.resolve(InstrumentKind::Counter, name)? {
            Instrument::Counter(counter) => Ok(counter),
            other => Err(self.mismatch(name, other.kind(), InstrumentKind::Counter)),
        }
    }

    /// Resolve a histogram
    ///
    /// # Errors
    /// See [`InstrumentRegistry::resolve`].
    pub fn histogram(&self, name: &str) -> MetricsResult<Arc<dyn HistogramHandle>> {
        match self.resolve(InstrumentKind::Histogram, name)? {
            Instrument::Histogram(histogram) => Ok(histogram),
            other => Err(self.mismatch(name, other.kind(), InstrumentKind::Histogram)),
        }
    }

    /// Resolve a gauge
    ///
    /// # Errors
    /// See [`InstrumentRegistry::resolve`].
    pub fn gauge(&self, name: &str) -> MetricsResult<Arc<dyn GaugeHandle>> {
        match self.resolve(InstrumentKind::Gauge, name)? {
            Instrument::Gauge(gauge) => Ok(gauge),
            other => Err(self.mismatch(name, other.kind(), InstrumentKind::Gauge)),
        }
    }

    /// Number of created instruments across all kinds
    pub fn len(&self) -> usize {
        self.counters.instruments.len()
            + self.histograms.instruments.len()
            + self.gauges.instruments.len()
    }

    /// Whether no instrument has been created yet
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether an instrument exists for `(kind, name)`
    pub fn contains(&self, kind: InstrumentKind, name: &str) -> bool {
        self.table(kind).instruments.contains_key(name)
    }

    /// Full sink-side name for a basename
    pub fn full_name(&self, name: &str) -> String {
        if self.prefix.is_empty() {
            name.to_owned()
        } else {
            format!("{}_{}", self.prefix, name)
        }
    }

    const fn table(&self, kind: InstrumentKind) -> &KindTable {
        match kind {
            InstrumentKind::Counter => &self.counters,
            InstrumentKind::Histogram => &self.histograms,
            InstrumentKind::Gauge => &self.gauges,
        }
    }

    /// Kind already registered under `name` that `kind` cannot share it with
    fn conflicting_kind(&self, kind: InstrumentKind, name: &str) -> Option<InstrumentKind> {
        let incompatible: &[InstrumentKind] = match kind {
            InstrumentKind::Counter | InstrumentKind::Histogram => &[InstrumentKind::Gauge],
            InstrumentKind::Gauge => &[InstrumentKind::Counter, InstrumentKind::Histogram],
        };
        incompatible.iter().copied().find(|other| self.contains(*other, name))
    }

    fn create(&self, kind: InstrumentKind, full_name: &str) -> MetricsResult<Instrument> {
        Ok(match kind {
            InstrumentKind::Counter => Instrument::Counter(self.sink.create_counter(full_name)?),
            InstrumentKind::Histogram => {
                Instrument::Histogram(self.sink.create_histogram(full_name)?)
            }
            InstrumentKind::Gauge => Instrument::Gauge(self.sink.create_gauge(full_name)?),
        })
    }

    fn mismatch(
        &self,
        name: &str,
        existing: InstrumentKind,
        requested: InstrumentKind,
    ) -> MetricsError {
        tracing::error!(
            metric = %self.full_name(name),
            %existing,
            %requested,
            "Instrument name already used by another kind"
        );
        MetricsError::KindMismatch { name: name.to_owned(), existing, requested }
    }
}
