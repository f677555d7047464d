//! JSON-lines log exporter
//!
//! Ships bridged log records to a collector over UDP, one JSON object per
//! line.
//!
//! ## Design
//! - **Batched**: records are buffered and sent once the batch is full or
//!   on [`LogSink::flush`]
//! - **Packed datagrams**: a batch is split into newline-joined datagrams of
//!   at most 8 KiB; a longer single line goes out alone
//! - **Non-blocking**: a send that would block is dropped with a warning
//!
//! ## Line format
//! ```text
//! {"timestamp_ms":1718000000000,"severity":"INFO","body":"Order settled",
//!  "target":"billing::orders","attributes":{"env":"prod","order_id":42}}
//! ```

use std::io;
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};
use std::time::UNIX_EPOCH;

use meterline_core::{LogRecord, LogSink};
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::{Map, Value};

/// Records buffered before a batch is sent
pub const DEFAULT_BATCH_SIZE: usize = 64;

/// Largest payload packed into one datagram
const MAX_DATAGRAM: usize = 8 * 1024;

#[derive(Debug, Serialize)]
struct WireRecord<'a> {
    timestamp_ms: u64,
    severity: &'static str,
    body: &'a str,
    target: &'a str,
    attributes: Map<String, Value>,
}

/// [`LogSink`] sending JSON lines to a UDP collector
#[derive(Debug)]
pub struct JsonLinesLogSink {
    socket: UdpSocket,
    collector_addr: SocketAddr,
    batch_size: usize,
    buffer: Mutex<Vec<String>>,
}

impl JsonLinesLogSink {
    /// Resolve `endpoint` (`host:port`) and open a non-blocking socket for it
    ///
    /// # Errors
    /// Returns an IO error if the address does not resolve or the local
    /// socket cannot be bound.
    pub fn connect(endpoint: &str) -> io::Result<Self> {
        let collector_addr = endpoint.to_socket_addrs()?.next().ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "Invalid log collector address")
        })?;
        Self::with_collector_addr(collector_addr)
    }

    /// Open a non-blocking socket sending to `collector_addr`
    ///
    /// # Errors
    /// Returns an IO error if the local socket cannot be bound.
    pub fn with_collector_addr(collector_addr: SocketAddr) -> io::Result<Self> {
        let bind_addr = if collector_addr.is_ipv4() { "0.0.0.0:0" } else { "[::]:0" };
        let socket = UdpSocket::bind(bind_addr)?;
        socket.set_nonblocking(true)?;

        tracing::debug!(%collector_addr, "Log exporter ready");
        Ok(Self {
            socket,
            collector_addr,
            batch_size: DEFAULT_BATCH_SIZE,
            buffer: Mutex::new(Vec::new()),
        })
    }

    /// Send once `batch_size` records are buffered (at least one)
    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn collector_addr(&self) -> SocketAddr {
        self.collector_addr
    }

    /// Records waiting for the next batch
    pub fn pending(&self) -> usize {
        self.buffer.lock().len()
    }

    fn send_batch(&self, lines: &[String]) {
        for datagram in pack_datagrams(lines) {
            match self.socket.send_to(datagram.as_bytes(), self.collector_addr) {
                Ok(_) => {}
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    tracing::warn!(error = %e, "Dropped log batch: send would block");
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to send log batch");
                }
            }
        }
    }
}

impl LogSink for JsonLinesLogSink {
    fn emit(&self, record: LogRecord) {
        let line = match encode_line(&record) {
            Ok(line) => line,
            Err(e) => {
                tracing::debug!(error = %e, "Dropped unencodable log record");
                return;
            }
        };

        let full = {
            let mut buffer = self.buffer.lock();
            buffer.push(line);
            (buffer.len() >= self.batch_size).then(|| std::mem::take(&mut *buffer))
        };
        if let Some(lines) = full {
            self.send_batch(&lines);
        }
    }

    fn flush(&self) {
        let lines = std::mem::take(&mut *self.buffer.lock());
        if !lines.is_empty() {
            self.send_batch(&lines);
        }
    }
}

/// Encode one record as a JSON line (no trailing newline)
///
/// # Errors
/// Returns the serializer error; scalar attributes never produce one.
pub fn encode_line(record: &LogRecord) -> serde_json::Result<String> {
    let timestamp_ms = record
        .timestamp
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0);

    let mut attributes = Map::new();
    for kv in &record.attributes {
        if !attributes.contains_key(&*kv.key) {
            attributes.insert(kv.key.to_string(), serde_json::to_value(&kv.value)?);
        }
    }

    serde_json::to_string(&WireRecord {
        timestamp_ms,
        severity: record.severity.as_str(),
        body: &record.body,
        target: &record.target,
        attributes,
    })
}

/// Join lines into newline-separated payloads of at most [`MAX_DATAGRAM`]
fn pack_datagrams(lines: &[String]) -> Vec<String> {
    let mut datagrams = Vec::new();
    let mut current = String::new();
    for line in lines {
        if !current.is_empty() && current.len() + 1 + line.len() > MAX_DATAGRAM {
            datagrams.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push('\n');
        }
        current.push_str(line);
    }
    if !current.is_empty() {
        datagrams.push(current);
    }
    datagrams
}
