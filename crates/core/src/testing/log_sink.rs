use std::sync::Arc;

use parking_lot::Mutex;

use crate::log_ports::{LogRecord, LogSink, Severity};

/// Log sink collecting records in memory
#[derive(Debug, Clone, Default)]
pub struct InMemoryLogSink {
    records: Arc<Mutex<Vec<LogRecord>>>,
    flushes: Arc<Mutex<usize>>,
}

impl InMemoryLogSink {
    /// Create an empty sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Every record received, in arrival order
    pub fn records(&self) -> Vec<LogRecord> {
        self.records.lock().clone()
    }

    /// Records at `severity`
    pub fn records_at(&self, severity: Severity) -> Vec<LogRecord> {
        self.records.lock().iter().filter(|r| r.severity == severity).cloned().collect()
    }

    /// Number of records received
    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    /// Whether nothing was received
    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }

    /// Number of `flush` calls
    pub fn flush_count(&self) -> usize {
        *self.flushes.lock()
    }
}

impl LogSink for InMemoryLogSink {
    fn emit(&self, record: LogRecord) {
        self.records.lock().push(record);
    }

    fn flush(&self) {
        *self.flushes.lock() += 1;
    }
}
