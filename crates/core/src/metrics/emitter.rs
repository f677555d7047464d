//! Emission API
//!
//! [`Metrics`] is the single entry point adapters call. It is cheap to clone
//! and is handed to every adapter by constructor injection.
//!
//! A `Metrics` value starts either installed ([`Metrics::new`]) or empty
//! ([`Metrics::uninitialized`]). Until a sink is installed every emit call
//! returns immediately, so adapters can be wired before startup finishes and
//! stay inert when metrics are disabled.

use std::sync::{Arc, OnceLock};
use std::time::Instant;

use meterline_domain::{KeyValue, ProcessIdentity, TelemetryError};

use super::enrich::AttributeEnricher;
use super::ports::{InstrumentKind, MetricsSink};
use super::registry::InstrumentRegistry;
use crate::context::EmitContext;

#[derive(Debug)]
struct MetricsCore {
    registry: InstrumentRegistry,
    enricher: AttributeEnricher,
}

/// Shared handle to the registry, enricher and initialization gate
#[derive(Debug, Clone, Default)]
pub struct Metrics {
    core: Arc<OnceLock<MetricsCore>>,
}

impl Metrics {
    /// Create an installed handle emitting to `sink`
    ///
    /// Instrument names are prefixed with the identity's service name.
    pub fn new(sink: Arc<dyn MetricsSink>, identity: Arc<ProcessIdentity>) -> Self {
        Self { core: Arc::new(OnceLock::from(MetricsCore::new(sink, identity))) }
    }

    /// Create a handle that ignores every emission until [`Metrics::install`]
    pub fn uninitialized() -> Self {
        Self::default()
    }

    /// Install the sink, opening the gate for this handle and all its clones
    ///
    /// # Errors
    /// Returns `TelemetryError::AlreadyInitialized` if a sink is already
    /// installed.
    pub fn install(
        &self,
        sink: Arc<dyn MetricsSink>,
        identity: Arc<ProcessIdentity>,
    ) -> Result<(), TelemetryError> {
        self.core
            .set(MetricsCore::new(sink, identity))
            .map_err(|_| TelemetryError::AlreadyInitialized)?;
        tracing::info!("Metrics pipeline initialized");
        Ok(())
    }

    /// Whether a sink is installed
    pub fn is_enabled(&self) -> bool {
        self.core.get().is_some()
    }

    /// Registry, once installed
    pub fn registry(&self) -> Option<&InstrumentRegistry> {
        self.core.get().map(|core| &core.registry)
    }

    /// Add `delta` to the counter `name`
    pub fn emit_count(&self, ctx: &EmitContext, name: &str, delta: i64, attrs: &[KeyValue]) {
        self.emit(InstrumentKind::Counter, ctx, name, delta, attrs);
    }

    /// Record a duration in milliseconds on the histogram `name`
    ///
    /// The value is forwarded as given, negative values included.
    pub fn emit_time(&self, ctx: &EmitContext, name: &str, millis: i64, attrs: &[KeyValue]) {
        self.emit(InstrumentKind::Histogram, ctx, name, millis, attrs);
    }

    /// Record the current level of the gauge `name`
    pub fn emit_gauge(&self, ctx: &EmitContext, name: &str, value: i64, attrs: &[KeyValue]) {
        self.emit(InstrumentKind::Gauge, ctx, name, value, attrs);
    }

    /// Record the time since `started` and count one operation under `name`
    pub fn emit_elapsed(
        &self,
        ctx: &EmitContext,
        name: &str,
        started: Instant,
        attrs: &[KeyValue],
    ) {
        let millis = i64::try_from(started.elapsed().as_millis()).unwrap_or(i64::MAX);
        self.emit_time(ctx, name, millis, attrs);
        self.emit_count(ctx, name, 1, attrs);
    }

    fn emit(
        &self,
        kind: InstrumentKind,
        ctx: &EmitContext,
        name: &str,
        value: i64,
        attrs: &[KeyValue],
    ) {
        let Some(core) = self.core.get() else {
            return;
        };

        let instrument = match core.registry.resolve(kind, name) {
            Ok(instrument) => instrument,
            Err(e) => {
                tracing::debug!(metric = %name, %kind, error = %e, "Dropped measurement");
                return;
            }
        };

        let attrs = core.enricher.enrich(attrs);
        instrument.submit(ctx, value, &attrs);
    }
}

impl MetricsCore {
    fn new(sink: Arc<dyn MetricsSink>, identity: Arc<ProcessIdentity>) -> Self {
        let registry = InstrumentRegistry::new(sink, identity.service_name.clone());
        Self { registry, enricher: AttributeEnricher::new(identity) }
    }
}
