//! Operation observer pattern
//!
//! Every instrumented subsystem exposes some "before" and "after" hook. An
//! adapter turns the before hook into a token carrying the start instant and
//! the after hook into a time + count emission. The token travels through the
//! subsystem's own call convention (returned value, request extension,
//! callback argument); nothing is stashed in dynamically typed context.
//!
//! The after hook receives `Option<Token>`: when the subsystem lost the
//! token the adapter records nothing and the host operation continues.

use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Instant;

use meterline_domain::KeyValue;

use crate::context::EmitContext;
use crate::metrics::Metrics;

/// Start instant captured by a before hook
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OperationStart {
    started: Instant,
}

impl OperationStart {
    /// Capture the current monotonic time
    pub fn now() -> Self {
        Self { started: Instant::now() }
    }

    /// Use an explicit start instant
    pub const fn at(started: Instant) -> Self {
        Self { started }
    }

    /// Start instant
    pub const fn instant(&self) -> Instant {
        self.started
    }

    /// Whole milliseconds elapsed until `end`
    ///
    /// Saturates at zero if `end` precedes the start.
    pub fn millis_until(&self, end: Instant) -> i64 {
        i64::try_from(end.saturating_duration_since(self.started).as_millis()).unwrap_or(i64::MAX)
    }

    /// Whole milliseconds elapsed until now
    pub fn elapsed_millis(&self) -> i64 {
        self.millis_until(Instant::now())
    }
}

/// Start/finish capability implemented once per instrumented subsystem
pub trait OperationObserver: Send + Sync {
    /// What the before hook knows about the operation
    type Operation;
    /// Per-operation value carried from before to after
    type Token: Send;
    /// What the after hook knows about the result
    type Outcome;

    /// Before hook: arm the measurement
    fn on_start(&self, operation: Self::Operation) -> Self::Token;

    /// After hook: emit the measurement
    ///
    /// Must never panic or fail; a missing token is ignored.
    fn on_finish(&self, token: Option<Self::Token>, outcome: Self::Outcome);

    /// Run `operation` between the two hooks and return its result unchanged
    fn observe<R>(
        &self,
        operation: Self::Operation,
        run: impl FnOnce() -> R,
        outcome: impl FnOnce(&R) -> Self::Outcome,
    ) -> R {
        let token = self.on_start(operation);
        let result = run();
        self.on_finish(Some(token), outcome(&result));
        result
    }
}

/// Emits the time + count pair for one metric basename
#[derive(Debug, Clone)]
pub struct OperationRecorder {
    metrics: Metrics,
    basename: String,
}

impl OperationRecorder {
    /// Recorder for `basename` on `metrics`
    pub fn new(metrics: Metrics, basename: impl Into<String>) -> Self {
        Self { metrics, basename: basename.into() }
    }

    /// Metric basename
    pub fn basename(&self) -> &str {
        &self.basename
    }

    /// Emission handle
    pub const fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Record an operation that started at `start` and ended now
    pub fn record(&self, ctx: &EmitContext, start: OperationStart, attrs: &[KeyValue]) {
        self.record_until(ctx, start, Instant::now(), attrs);
    }

    /// Record an operation that started at `start` and ended at `end`
    pub fn record_until(
        &self,
        ctx: &EmitContext,
        start: OperationStart,
        end: Instant,
        attrs: &[KeyValue],
    ) {
        let millis = start.millis_until(end);
        self.metrics.emit_time(ctx, &self.basename, millis, attrs);
        self.metrics.emit_count(ctx, &self.basename, 1, attrs);
    }
}

/// Live-connection level gauge
///
/// Incremented on open, decremented on close; each hook emits the level it
/// produced, not a later re-read, so concurrent hooks each report their own
/// step.
#[derive(Debug)]
pub struct ConnectionGauge {
    metrics: Metrics,
    basename: String,
    live: AtomicI64,
}

impl ConnectionGauge {
    /// Gauge for `basename` on `metrics`, starting at zero
    pub fn new(metrics: Metrics, basename: impl Into<String>) -> Self {
        Self { metrics, basename: basename.into(), live: AtomicI64::new(0) }
    }

    /// Connection opened; returns the new level
    pub fn on_open(&self, ctx: &EmitContext, attrs: &[KeyValue]) -> i64 {
        let level = self.live.fetch_add(1, Ordering::SeqCst).wrapping_add(1);
        self.metrics.emit_gauge(ctx, &self.basename, level, attrs);
        level
    }

    /// Connection closed; returns the new level
    pub fn on_close(&self, ctx: &EmitContext, attrs: &[KeyValue]) -> i64 {
        let level = self.live.fetch_sub(1, Ordering::SeqCst).wrapping_sub(1);
        self.metrics.emit_gauge(ctx, &self.basename, level, attrs);
        level
    }

    /// Current level
    pub fn current(&self) -> i64 {
        self.live.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use meterline_domain::ProcessIdentity;

    use super::*;
    use crate::metrics::InstrumentKind;
    use crate::testing::InMemorySink;

    fn metrics(sink: &InMemorySink) -> Metrics {
        Metrics::new(
            Arc::new(sink.clone()),
            Arc::new(ProcessIdentity::new("svc", "1.0.0", "test", "host-a")),
        )
    }

    #[derive(Debug)]
    struct JobObserver {
        recorder: OperationRecorder,
    }

    impl OperationObserver for JobObserver {
        type Operation = &'static str;
        type Token = (OperationStart, &'static str);
        type Outcome = bool;

        fn on_start(&self, operation: Self::Operation) -> Self::Token {
            (OperationStart::now(), operation)
        }

        fn on_finish(&self, token: Option<Self::Token>, outcome: Self::Outcome) {
            let Some((start, job)) = token else {
                return;
            };
            self.recorder.record(
                &EmitContext::background(),
                start,
                &[KeyValue::new("job", job), KeyValue::new("success", outcome)],
            );
        }
    }

    #[test]
    fn test_millis_until() {
        let base = Instant::now();
        let start = OperationStart::at(base);
        assert_eq!(start.millis_until(base + Duration::from_millis(250)), 250);
        assert_eq!(start.instant(), base);
    }

    #[test]
    fn test_millis_until_saturates_on_earlier_end() {
        let base = Instant::now() + Duration::from_secs(1);
        let start = OperationStart::at(base);
        assert_eq!(start.millis_until(Instant::now()), 0);
    }

    #[test]
    fn test_record_until_emits_time_and_count() {
        let sink = InMemorySink::new();
        let recorder = OperationRecorder::new(metrics(&sink), "orm");
        let base = Instant::now();

        recorder.record_until(
            &EmitContext::background(),
            OperationStart::at(base),
            base + Duration::from_millis(42),
            &[KeyValue::new("table", "orders")],
        );

        assert_eq!(recorder.basename(), "orm");
        assert_eq!(sink.histogram_samples("svc_orm"), vec![42]);
        assert_eq!(sink.counter_total("svc_orm"), 1);
    }

    #[test]
    fn test_observe_passes_result_through() {
        let sink = InMemorySink::new();
        let observer = JobObserver { recorder: OperationRecorder::new(metrics(&sink), "jobs") };

        let result: Result<u32, &str> = observer.observe("reindex", || Err("boom"), Result::is_ok);

        assert_eq!(result, Err("boom"));
        let measurement = sink.measurements().pop().unwrap();
        assert_eq!(measurement.attribute("success"), Some(&false.into()));
        assert_eq!(measurement.attribute("job"), Some(&"reindex".into()));
    }

    #[test]
    fn test_missing_token_records_nothing() {
        let sink = InMemorySink::new();
        let observer = JobObserver { recorder: OperationRecorder::new(metrics(&sink), "jobs") };

        observer.on_finish(None, true);
        assert_eq!(sink.measurement_count(), 0);
    }

    #[test]
    fn test_connection_gauge_sequence() {
        let sink = InMemorySink::new();
        let gauge = ConnectionGauge::new(metrics(&sink), "tcp_live");
        let ctx = EmitContext::background();

        let levels = vec![
            gauge.on_open(&ctx, &[]),
            gauge.on_open(&ctx, &[]),
            gauge.on_close(&ctx, &[]),
            gauge.on_open(&ctx, &[]),
            gauge.on_close(&ctx, &[]),
            gauge.on_close(&ctx, &[]),
        ];

        assert_eq!(levels, vec![1, 2, 1, 2, 1, 0]);
        assert_eq!(sink.gauge_values("svc_tcp_live"), vec![1, 2, 1, 2, 1, 0]);
        assert_eq!(gauge.current(), 0);
        assert_eq!(sink.creation_count(InstrumentKind::Gauge, "svc_tcp_live"), 1);
    }

    #[test]
    fn test_connection_gauge_counts_without_sink() {
        let gauge = ConnectionGauge::new(Metrics::uninitialized(), "tcp_live");
        let ctx = EmitContext::background();

        gauge.on_open(&ctx, &[]);
        gauge.on_open(&ctx, &[]);
        assert_eq!(gauge.current(), 2);
    }
}
