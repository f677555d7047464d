//! DogStatsD metrics sink
//!
//! Sends measurements to a DogStatsD agent over raw UDP.
//!
//! ## Design
//! - **Raw UDP sockets**: one datagram per measurement, no client library
//! - **Non-blocking**: a send that would block is dropped with a warning
//! - **Best-effort delivery**: UDP is fire-and-forget, no retry logic
//! - **Tags**: every attribute becomes a `key:value` DogStatsD tag
//!
//! ## DogStatsD Protocol
//! ```text
//! <METRIC_NAME>:<VALUE>|<TYPE>|#<TAG1>:<VALUE1>,<TAG2>:<VALUE2>
//! ```
//!
//! Adapters record a counter and a histogram under the same basename, which
//! a DogStatsD agent would treat as one metric with conflicting types. The
//! sink therefore suffixes counter names with `.count` and histogram names
//! with `.duration_ms`; gauges keep their name.
//!
//! Examples:
//! - Counter: `billing_api_http.count:1|c|#path:/orders,env:prod`
//! - Histogram: `billing_api_http.duration_ms:45|h|#path:/orders,env:prod`
//! - Gauge: `billing_api_tcp_live:3|g|#env:prod`

use std::fmt::Write as _;
use std::io;
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};
use std::sync::Arc;

use meterline_core::{
    CounterHandle, EmitContext, GaugeHandle, HistogramHandle, InstrumentKind, MetricsError,
    MetricsResult, MetricsSink,
};
use meterline_domain::config::DEFAULT_METRICS_ENDPOINT;
use meterline_domain::KeyValue;

/// Default DogStatsD agent address
pub const DEFAULT_AGENT_ADDR: &str = DEFAULT_METRICS_ENDPOINT;

/// Characters DogStatsD reserves in metric names
const RESERVED_NAME_CHARS: [char; 4] = [':', '|', '@', '#'];

/// UDP socket shared by every instrument of one sink
#[derive(Debug)]
struct Transport {
    socket: UdpSocket,
    agent_addr: SocketAddr,
}

impl Transport {
    fn send(&self, metric: &str, line: &str) -> MetricsResult<()> {
        match self.socket.send_to(line.as_bytes(), self.agent_addr) {
            Ok(_) => {
                tracing::trace!(metric = %metric, "Sent metric to DogStatsD agent");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                tracing::warn!(metric = %metric, error = %e, "Dropped metric: send would block");
                Ok(())
            }
            Err(e) => {
                tracing::warn!(
                    metric = %metric,
                    error = %e,
                    "Failed to send metric to DogStatsD agent"
                );
                Err(MetricsError::SendFailed { source: e })
            }
        }
    }
}

/// DogStatsD implementation of [`MetricsSink`]
#[derive(Debug, Clone)]
pub struct DogStatsdSink {
    transport: Arc<Transport>,
}

impl DogStatsdSink {
    /// Resolve `endpoint` (`host:port`) and open a non-blocking socket for it
    ///
    /// # Errors
    /// Returns an IO error if the address does not resolve or the local
    /// socket cannot be bound.
    pub fn connect(endpoint: &str) -> io::Result<Self> {
        let agent_addr = endpoint.to_socket_addrs()?.next().ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "Invalid DogStatsD address")
        })?;
        Self::with_agent_addr(agent_addr)
    }

    /// Open a non-blocking socket sending to `agent_addr`
    ///
    /// # Errors
    /// Returns an IO error if the local socket cannot be bound.
    pub fn with_agent_addr(agent_addr: SocketAddr) -> io::Result<Self> {
        // Bind to any available port of the agent's address family
        let bind_addr = if agent_addr.is_ipv4() { "0.0.0.0:0" } else { "[::]:0" };
        let socket = UdpSocket::bind(bind_addr)?;
        socket.set_nonblocking(true)?;

        tracing::debug!(%agent_addr, "DogStatsD sink ready");
        Ok(Self { transport: Arc::new(Transport { socket, agent_addr }) })
    }

    /// Agent address measurements are sent to
    pub fn agent_addr(&self) -> SocketAddr {
        self.transport.agent_addr
    }

    fn instrument(
        &self,
        kind: InstrumentKind,
        name: &str,
    ) -> MetricsResult<Arc<DogStatsdInstrument>> {
        validate_name(name)?;
        Ok(Arc::new(DogStatsdInstrument {
            transport: Arc::clone(&self.transport),
            wire_name: wire_name(kind, name),
            kind,
        }))
    }
}

impl MetricsSink for DogStatsdSink {
    fn create_counter(&self, name: &str) -> MetricsResult<Arc<dyn CounterHandle>> {
        let counter: Arc<dyn CounterHandle> = self.instrument(InstrumentKind::Counter, name)?;
        Ok(counter)
    }

    fn create_histogram(&self, name: &str) -> MetricsResult<Arc<dyn HistogramHandle>> {
        let histogram: Arc<dyn HistogramHandle> =
            self.instrument(InstrumentKind::Histogram, name)?;
        Ok(histogram)
    }

    fn create_gauge(&self, name: &str) -> MetricsResult<Arc<dyn GaugeHandle>> {
        let gauge: Arc<dyn GaugeHandle> = self.instrument(InstrumentKind::Gauge, name)?;
        Ok(gauge)
    }
}

#[derive(Debug)]
struct DogStatsdInstrument {
    transport: Arc<Transport>,
    wire_name: String,
    kind: InstrumentKind,
}

impl DogStatsdInstrument {
    fn send(&self, ctx: &EmitContext, value: i64, attrs: &[KeyValue]) {
        if ctx.is_expired() {
            tracing::trace!(metric = %self.wire_name, "Dropped metric: context expired");
            return;
        }

        let line = format_line(&self.wire_name, value, self.kind, attrs);
        // Failures are already logged by the transport
        let _ = self.transport.send(&self.wire_name, &line);
    }
}

impl CounterHandle for DogStatsdInstrument {
    fn add(&self, ctx: &EmitContext, value: i64, attrs: &[KeyValue]) {
        self.send(ctx, value, attrs);
    }
}

impl HistogramHandle for DogStatsdInstrument {
    fn record(&self, ctx: &EmitContext, value: i64, attrs: &[KeyValue]) {
        self.send(ctx, value, attrs);
    }
}

impl GaugeHandle for DogStatsdInstrument {
    fn record(&self, ctx: &EmitContext, value: i64, attrs: &[KeyValue]) {
        self.send(ctx, value, attrs);
    }
}

/// Check that `name` can be used as a DogStatsD metric name
///
/// # Errors
/// Returns `MetricsError::InvalidName` for empty names and names containing
/// whitespace or one of `:|@#`.
pub fn validate_name(name: &str) -> MetricsResult<()> {
    let reason = if name.is_empty() {
        "name is empty"
    } else if name.chars().any(char::is_whitespace) {
        "name contains whitespace"
    } else if name.contains(RESERVED_NAME_CHARS) {
        "name contains a reserved character (one of :|@#)"
    } else {
        return Ok(());
    };
    Err(MetricsError::InvalidName { name: name.to_owned(), reason })
}

/// DogStatsD type code for an instrument kind
pub const fn type_code(kind: InstrumentKind) -> &'static str {
    match kind {
        InstrumentKind::Counter => "c",
        InstrumentKind::Histogram => "h",
        InstrumentKind::Gauge => "g",
    }
}

/// Name sent on the wire for an instrument
pub fn wire_name(kind: InstrumentKind, name: &str) -> String {
    match kind {
        InstrumentKind::Counter => format!("{name}.count"),
        InstrumentKind::Histogram => format!("{name}.duration_ms"),
        InstrumentKind::Gauge => name.to_owned(),
    }
}

/// Build one DogStatsD line: `<name>:<value>|<type>|#k:v,...`
pub fn format_line(
    wire_name: &str,
    value: i64,
    kind: InstrumentKind,
    attrs: &[KeyValue],
) -> String {
    let mut line = format!("{wire_name}:{value}|{}", type_code(kind));
    for (i, kv) in attrs.iter().enumerate() {
        line.push_str(if i == 0 { "|#" } else { "," });
        push_tag_part(&mut line, &kv.key, true);
        line.push(':');
        push_tag_part(&mut line, &kv.value.to_string(), false);
    }
    line
}

/// Append tag text, replacing characters that would break the line format
fn push_tag_part(line: &mut String, text: &str, is_key: bool) {
    for c in text.chars() {
        let reserved = matches!(c, ',' | '|' | '#' | '@')
            || c.is_whitespace()
            || (is_key && c == ':');
        let _ = line.write_char(if reserved { '_' } else { c });
    }
}
