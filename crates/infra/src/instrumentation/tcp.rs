//! TCP application framework adapter
//!
//! Message frameworks route each inbound message by id through a middleware
//! chain. [`TcpMetrics::handle`] wraps the rest of the chain and times it;
//! the connection start/stop callbacks drive the `tcp_live` gauge.

use meterline_core::{
    ConnectionGauge, EmitContext, Metrics, OperationObserver, OperationRecorder, OperationStart,
};
use meterline_domain::KeyValue;

/// Metric basename for routed messages
pub const TCP_METRIC: &str = "tcp";

/// Metric basename for the live-connection gauge
pub const TCP_LIVE_METRIC: &str = "tcp_live";

/// Token carried through one routed message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageToken {
    pub msg_id: u32,
    pub start: OperationStart,
}

/// Message timing and connection counting for a TCP server
///
/// One instance per server, shared by every connection task.
#[derive(Debug)]
pub struct TcpMetrics {
    recorder: OperationRecorder,
    live: ConnectionGauge,
}

impl TcpMetrics {
    pub fn new(metrics: Metrics) -> Self {
        Self {
            recorder: OperationRecorder::new(metrics.clone(), TCP_METRIC),
            live: ConnectionGauge::new(metrics, TCP_LIVE_METRIC),
        }
    }

    /// Connection start callback; returns the live count it reported
    pub fn on_connect(&self, ctx: &EmitContext) -> i64 {
        self.live.on_open(ctx, &[])
    }

    /// Connection stop callback; returns the live count it reported
    pub fn on_disconnect(&self, ctx: &EmitContext) -> i64 {
        self.live.on_close(ctx, &[])
    }

    /// Currently open connections
    pub fn live_connections(&self) -> i64 {
        self.live.current()
    }

    /// Router middleware: run `next` and time it under `msg_id`
    pub fn handle<R>(&self, msg_id: u32, next: impl FnOnce() -> R) -> R {
        self.observe(msg_id, next, |_| ())
    }
}

impl OperationObserver for TcpMetrics {
    type Operation = u32;
    type Token = MessageToken;
    type Outcome = ();

    fn on_start(&self, msg_id: Self::Operation) -> Self::Token {
        MessageToken { msg_id, start: OperationStart::now() }
    }

    fn on_finish(&self, token: Option<Self::Token>, _outcome: Self::Outcome) {
        let Some(token) = token else {
            return;
        };
        let attrs = [KeyValue::new("msg_id", token.msg_id.to_string())];
        self.recorder.record(&EmitContext::background(), token.start, &attrs);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Barrier};
    use std::thread;

    use meterline_core::testing::InMemorySink;
    use meterline_domain::{AttributeValue, ProcessIdentity};

    use super::*;

    fn adapter(sink: &InMemorySink) -> TcpMetrics {
        TcpMetrics::new(Metrics::new(
            Arc::new(sink.clone()),
            Arc::new(ProcessIdentity::new("game-server", "0.9.1", "test", "node-3")),
        ))
    }

    #[test]
    fn test_handle_records_message_id() {
        let sink = InMemorySink::new();
        let tcp = adapter(&sink);

        let reply = tcp.handle(1001, || "pong");
        assert_eq!(reply, "pong");

        assert_eq!(sink.counter_total("game_server_tcp"), 1);
        assert_eq!(sink.histogram_samples("game_server_tcp").len(), 1);
        let measurement = sink.measurements().pop().unwrap();
        assert_eq!(measurement.attribute("msg_id"), Some(&AttributeValue::from("1001")));
    }

    #[test]
    fn test_live_gauge_sequence() {
        let sink = InMemorySink::new();
        let tcp = adapter(&sink);
        let ctx = EmitContext::background();

        tcp.on_connect(&ctx);
        tcp.on_connect(&ctx);
        tcp.on_disconnect(&ctx);
        tcp.on_connect(&ctx);
        tcp.on_disconnect(&ctx);
        tcp.on_disconnect(&ctx);

        assert_eq!(sink.gauge_values("game_server_tcp_live"), vec![1, 2, 1, 2, 1, 0]);
        assert_eq!(tcp.live_connections(), 0);
    }

    #[test]
    fn test_connections_from_many_threads_balance_out() {
        let sink = InMemorySink::new();
        let tcp = Arc::new(adapter(&sink));
        let barrier = Arc::new(Barrier::new(8));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let tcp = Arc::clone(&tcp);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    let ctx = EmitContext::background();
                    for _ in 0..50 {
                        tcp.on_connect(&ctx);
                        tcp.on_disconnect(&ctx);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(tcp.live_connections(), 0);
        let levels = sink.gauge_values("game_server_tcp_live");
        assert_eq!(levels.len(), 800);
        assert!(levels.iter().all(|level| (0..=8).contains(level)));
    }

    #[test]
    fn test_missing_token_is_ignored() {
        let sink = InMemorySink::new();
        let tcp = adapter(&sink);

        tcp.on_finish(None, ());
        assert_eq!(sink.measurement_count(), 0);
    }
}
