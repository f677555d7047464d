//! Key-value client adapter
//!
//! Two shapes for two kinds of client:
//! - hook form for clients with before/after process hooks; the before hook
//!   returns a [`KvToken`] the client hands back to the after hook
//! - wrap form for clients without hooks; the call is passed as a closure
//!   (or future) and its result is returned unchanged
//!
//! Pipelines are always reported under the command name `pipeline`.

use std::future::Future;

use meterline_core::{EmitContext, Metrics, OperationObserver, OperationRecorder, OperationStart};
use meterline_domain::KeyValue;

/// Metric basename for key-value commands
pub const KV_METRIC: &str = "kv";

/// Command name reported for pipelines
pub const PIPELINE_COMMAND: &str = "pipeline";

/// Token returned by the before hooks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KvToken {
    pub start: OperationStart,
}

/// What the after hook reports
#[derive(Debug, Clone, Default)]
pub struct KvOutcome {
    pub command: String,
    pub ctx: EmitContext,
}

/// Key-value command timing
#[derive(Debug, Clone)]
pub struct KvMetrics {
    recorder: OperationRecorder,
}

impl KvMetrics {
    pub fn new(metrics: Metrics) -> Self {
        Self { recorder: OperationRecorder::new(metrics, KV_METRIC) }
    }

    /// Before-process hook
    pub fn before_process(&self) -> KvToken {
        KvToken { start: OperationStart::now() }
    }

    /// After-process hook for a single command
    pub fn after_process(&self, ctx: &EmitContext, token: Option<KvToken>, command: &str) {
        let Some(token) = token else {
            tracing::debug!(command, "Key-value after-hook without start token");
            return;
        };
        self.recorder.record(ctx, token.start, &[KeyValue::new("cmd", command.to_owned())]);
    }

    /// Before-pipeline hook
    pub fn before_pipeline(&self) -> KvToken {
        self.before_process()
    }

    /// After-pipeline hook
    pub fn after_pipeline(&self, ctx: &EmitContext, token: Option<KvToken>) {
        self.after_process(ctx, token, PIPELINE_COMMAND);
    }

    /// Time `call` as `command`
    pub fn wrap_process<T, E>(
        &self,
        ctx: &EmitContext,
        command: &str,
        call: impl FnOnce() -> Result<T, E>,
    ) -> Result<T, E> {
        let start = OperationStart::now();
        let result = call();
        self.record_result(ctx, start, command, result.is_ok());
        result
    }

    /// Time a pipeline `call`
    pub fn wrap_pipeline<T, E>(
        &self,
        ctx: &EmitContext,
        call: impl FnOnce() -> Result<T, E>,
    ) -> Result<T, E> {
        self.wrap_process(ctx, PIPELINE_COMMAND, call)
    }

    /// Time an async `call` as `command`
    pub async fn wrap_process_async<T, E, F>(
        &self,
        ctx: &EmitContext,
        command: &str,
        call: F,
    ) -> Result<T, E>
    where
        F: Future<Output = Result<T, E>>,
    {
        let start = OperationStart::now();
        let result = call.await;
        self.record_result(ctx, start, command, result.is_ok());
        result
    }

    /// Time an async pipeline `call`
    pub async fn wrap_pipeline_async<T, E, F>(&self, ctx: &EmitContext, call: F) -> Result<T, E>
    where
        F: Future<Output = Result<T, E>>,
    {
        self.wrap_process_async(ctx, PIPELINE_COMMAND, call).await
    }

    fn record_result(
        &self,
        ctx: &EmitContext,
        start: OperationStart,
        command: &str,
        success: bool,
    ) {
        let attrs = [KeyValue::new("cmd", command.to_owned()), KeyValue::new("success", success)];
        self.recorder.record(ctx, start, &attrs);
    }
}

impl OperationObserver for KvMetrics {
    type Operation = ();
    type Token = KvToken;
    type Outcome = KvOutcome;

    fn on_start(&self, _operation: Self::Operation) -> Self::Token {
        self.before_process()
    }

    fn on_finish(&self, token: Option<Self::Token>, outcome: Self::Outcome) {
        self.after_process(&outcome.ctx, token, &outcome.command);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use meterline_core::testing::InMemorySink;
    use meterline_domain::{AttributeValue, ProcessIdentity};

    use super::*;

    fn adapter(sink: &InMemorySink) -> KvMetrics {
        KvMetrics::new(Metrics::new(
            Arc::new(sink.clone()),
            Arc::new(ProcessIdentity::new("session-cache", "2.0.0", "test", "cache-1")),
        ))
    }

    #[test]
    fn test_hook_form_records_command() {
        let sink = InMemorySink::new();
        let kv = adapter(&sink);
        let ctx = EmitContext::background();

        let token = kv.before_process();
        kv.after_process(&ctx, Some(token), "get");

        assert_eq!(sink.counter_total("session_cache_kv"), 1);
        let measurement = sink.measurements().pop().unwrap();
        assert_eq!(measurement.attribute("cmd"), Some(&AttributeValue::from("get")));
        assert_eq!(measurement.attribute("success"), None);
    }

    #[test]
    fn test_pipeline_reported_as_pipeline() {
        let sink = InMemorySink::new();
        let kv = adapter(&sink);
        let ctx = EmitContext::background();

        let token = kv.before_pipeline();
        kv.after_pipeline(&ctx, Some(token));

        let measurement = sink.measurements().pop().unwrap();
        assert_eq!(measurement.attribute("cmd"), Some(&AttributeValue::from("pipeline")));
    }

    #[test]
    fn test_after_without_token_is_skipped() {
        let sink = InMemorySink::new();
        let kv = adapter(&sink);

        kv.after_process(&EmitContext::background(), None, "set");
        assert_eq!(sink.measurement_count(), 0);
    }

    #[test]
    fn test_wrap_passes_result_through() {
        let sink = InMemorySink::new();
        let kv = adapter(&sink);
        let ctx = EmitContext::background();

        let hit = kv.wrap_process(&ctx, "get", || Ok::<_, String>(Some("v1")));
        assert_eq!(hit, Ok(Some("v1")));

        let miss = kv.wrap_process(&ctx, "set", || Err::<(), _>("READONLY".to_owned()));
        assert_eq!(miss, Err("READONLY".to_owned()));

        let successes: Vec<_> = sink
            .measurements_named("session_cache_kv")
            .into_iter()
            .filter_map(|m| m.attribute("success").cloned())
            .collect();
        // Each call emits a histogram sample and a count
        assert_eq!(
            successes,
            vec![
                AttributeValue::Bool(true),
                AttributeValue::Bool(true),
                AttributeValue::Bool(false),
                AttributeValue::Bool(false)
            ]
        );
    }

    #[test]
    fn test_wrap_pipeline() {
        let sink = InMemorySink::new();
        let kv = adapter(&sink);

        let replies = kv.wrap_pipeline(&EmitContext::background(), || Ok::<_, ()>(vec![1, 2, 3]));
        assert_eq!(replies.unwrap().len(), 3);

        let measurement = sink.measurements().pop().unwrap();
        assert_eq!(measurement.attribute("cmd"), Some(&AttributeValue::from("pipeline")));
    }

    #[tokio::test]
    async fn test_async_wrap() {
        let sink = InMemorySink::new();
        let kv = adapter(&sink);
        let ctx = EmitContext::background();

        let value = kv.wrap_process_async(&ctx, "incr", async { Ok::<i64, ()>(42) }).await;
        assert_eq!(value, Ok(42));

        let err = kv.wrap_pipeline_async(&ctx, async { Err::<(), _>("timeout") }).await;
        assert_eq!(err, Err("timeout"));

        assert_eq!(sink.counter_total("session_cache_kv"), 2);
    }

    #[test]
    fn test_uninitialized_metrics_still_run_call() {
        let kv = KvMetrics::new(Metrics::uninitialized());
        let value = kv.wrap_process(&EmitContext::background(), "get", || Ok::<_, ()>(7));
        assert_eq!(value, Ok(7));
    }
}
