//! Document store command monitor
//!
//! Document store drivers publish started / succeeded / failed events per
//! command, correlated by request id. The monitor keeps the start instant of
//! every in-flight request and emits when the matching completion arrives.
//!
//! Drivers may drop a completion (connection reset mid-command, monitor
//! swapped). The in-flight table is therefore bounded: past
//! [`DEFAULT_MAX_PENDING`] entries the oldest quarter is evicted, and
//! [`CommandMonitor::evict_older_than`] clears stale starts on demand.

use std::time::{Duration, Instant};

use dashmap::DashMap;
use meterline_core::{
    EmitContext, Metrics, OperationObserver, OperationRecorder, OperationStart,
};
use meterline_domain::KeyValue;

/// Metric basename for document store commands
pub const DOCSTORE_METRIC: &str = "docstore";

/// In-flight requests kept before the oldest are evicted
pub const DEFAULT_MAX_PENDING: usize = 10_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandStartedEvent {
    pub request_id: i64,
    pub command_name: String,
    pub database_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSucceededEvent {
    pub request_id: i64,
    pub command_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandFailedEvent {
    pub request_id: i64,
    pub command_name: String,
    pub failure: String,
}

/// Command completion as seen by the monitor
#[derive(Debug, Clone)]
pub struct CommandOutcome {
    pub command_name: String,
    pub success: bool,
    pub ctx: EmitContext,
}

/// Command timing keyed by request id
#[derive(Debug)]
pub struct CommandMonitor {
    recorder: OperationRecorder,
    in_flight: DashMap<i64, OperationStart>,
    max_pending: usize,
}

impl CommandMonitor {
    pub fn new(metrics: Metrics) -> Self {
        Self {
            recorder: OperationRecorder::new(metrics, DOCSTORE_METRIC),
            in_flight: DashMap::new(),
            max_pending: DEFAULT_MAX_PENDING,
        }
    }

    /// Bound the in-flight table to `max_pending` requests (at least one)
    #[must_use]
    pub fn with_max_pending(mut self, max_pending: usize) -> Self {
        self.max_pending = max_pending.max(1);
        self
    }

    /// Command started
    pub fn started(&self, event: &CommandStartedEvent) {
        tracing::trace!(
            request_id = event.request_id,
            command = %event.command_name,
            database = %event.database_name,
            "Document store command started"
        );
        self.track(event.request_id, OperationStart::now());
    }

    /// Command succeeded
    pub fn succeeded(&self, ctx: &EmitContext, event: &CommandSucceededEvent) {
        self.finish(ctx, event.request_id, &event.command_name, true);
    }

    /// Command failed
    pub fn failed(&self, ctx: &EmitContext, event: &CommandFailedEvent) {
        tracing::debug!(
            request_id = event.request_id,
            command = %event.command_name,
            failure = %event.failure,
            "Document store command failed"
        );
        self.finish(ctx, event.request_id, &event.command_name, false);
    }

    /// Requests started but not yet completed
    pub fn pending(&self) -> usize {
        self.in_flight.len()
    }

    /// Drop starts older than `max_age`; returns how many were dropped
    pub fn evict_older_than(&self, max_age: Duration) -> usize {
        let now = Instant::now();
        let before = self.in_flight.len();
        self.in_flight
            .retain(|_, start| now.saturating_duration_since(start.instant()) <= max_age);
        let evicted = before.saturating_sub(self.in_flight.len());
        if evicted > 0 {
            tracing::warn!(evicted, ?max_age, "Evicted stale document store requests");
        }
        evicted
    }

    fn track(&self, request_id: i64, start: OperationStart) {
        self.in_flight.insert(request_id, start);
        if self.in_flight.len() > self.max_pending {
            self.evict_oldest();
        }
    }

    /// Shrink the table to three quarters of its bound, oldest first
    fn evict_oldest(&self) {
        let keep = self.max_pending - self.max_pending / 4;
        let mut starts: Vec<(Instant, i64)> = self
            .in_flight
            .iter()
            .map(|entry| (entry.value().instant(), *entry.key()))
            .collect();
        if starts.len() <= keep {
            return;
        }
        starts.sort_unstable();

        let evicted = starts.len() - keep;
        for (_, request_id) in &starts[..evicted] {
            self.in_flight.remove(request_id);
        }
        tracing::warn!(
            evicted,
            max_pending = self.max_pending,
            "Document store requests without completion evicted"
        );
    }

    fn finish(&self, ctx: &EmitContext, request_id: i64, command: &str, success: bool) {
        let start = self.in_flight.remove(&request_id).map(|(_, start)| start);
        self.on_finish(
            start,
            CommandOutcome { command_name: command.to_owned(), success, ctx: *ctx },
        );
        if start.is_none() {
            tracing::debug!(
                request_id,
                command,
                "Completion for unknown document store request"
            );
        }
    }
}

impl OperationObserver for CommandMonitor {
    type Operation = i64;
    type Token = OperationStart;
    type Outcome = CommandOutcome;

    fn on_start(&self, request_id: Self::Operation) -> Self::Token {
        let start = OperationStart::now();
        self.track(request_id, start);
        start
    }

    fn on_finish(&self, token: Option<Self::Token>, outcome: Self::Outcome) {
        let Some(start) = token else {
            return;
        };
        let attrs = [
            KeyValue::new("cmd", outcome.command_name),
            KeyValue::new("success", outcome.success),
        ];
        self.recorder.record(&outcome.ctx, start, &attrs);
    }
}
