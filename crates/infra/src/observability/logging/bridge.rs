//! `tracing` to [`LogSink`] bridge
//!
//! [`LogBridgeLayer`] turns every `tracing` event into a [`LogRecord`]:
//! - the `message` field becomes the body
//! - integer, float, bool and string fields keep their type
//! - any other field is recorded through its `Debug` text
//! - `ERROR` events carry their code location (`code.filepath`,
//!   `code.lineno`, `code.namespace`) and the emitting thread's stack
//!   (`code.stacktrace`)
//! - the process identity is appended like on every measurement

use std::backtrace::Backtrace;
use std::cell::Cell;
use std::fmt;
use std::sync::Arc;
use std::time::SystemTime;

use meterline_core::{AttributeEnricher, LogRecord, LogSink, Severity};
use meterline_domain::{AttributeValue, KeyValue, ProcessIdentity};
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::Context;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::Layer;

const MESSAGE_FIELD: &str = "message";

thread_local! {
    // Set while a record is handed to the sink so events the sink logs
    // itself are not bridged again
    static FORWARDING: Cell<bool> = const { Cell::new(false) };
}

/// `tracing_subscriber` layer forwarding events to a [`LogSink`]
#[derive(Debug, Clone)]
pub struct LogBridgeLayer {
    sink: Arc<dyn LogSink>,
    enricher: AttributeEnricher,
}

impl LogBridgeLayer {
    /// Bridge events to `sink`, tagging them with `identity`
    pub fn new(sink: Arc<dyn LogSink>, identity: Arc<ProcessIdentity>) -> Self {
        Self { sink, enricher: AttributeEnricher::new(identity) }
    }

    /// Build the record for one event
    fn record_for(&self, event: &Event<'_>) -> LogRecord {
        let metadata = event.metadata();
        let severity = severity_for(metadata.level());

        let mut visitor = FieldVisitor::default();
        event.record(&mut visitor);

        if severity == Severity::Error {
            if let Some(file) = metadata.file() {
                visitor.attributes.push(KeyValue::new("code.filepath", file));
            }
            if let Some(line) = metadata.line() {
                visitor.attributes.push(KeyValue::new("code.lineno", line));
            }
            if let Some(module) = metadata.module_path() {
                visitor.attributes.push(KeyValue::new("code.namespace", module));
            }
            let stack = Backtrace::force_capture().to_string();
            visitor.attributes.push(KeyValue::new("code.stacktrace", stack));
        }

        LogRecord {
            timestamp: SystemTime::now(),
            severity,
            body: visitor.message.unwrap_or_default(),
            target: metadata.target().to_owned(),
            attributes: self.enricher.enrich(&visitor.attributes),
        }
    }
}

impl<S> Layer<S> for LogBridgeLayer
where
    S: Subscriber + for<'span> LookupSpan<'span>,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        if FORWARDING.with(Cell::get) {
            return;
        }

        let record = self.record_for(event);
        FORWARDING.with(|flag| flag.set(true));
        self.sink.emit(record);
        FORWARDING.with(|flag| flag.set(false));
    }
}

/// Map a `tracing` level onto a record severity
pub fn severity_for(level: &Level) -> Severity {
    match *level {
        Level::ERROR => Severity::Error,
        Level::WARN => Severity::Warn,
        Level::INFO => Severity::Info,
        Level::DEBUG => Severity::Debug,
        _ => Severity::Trace,
    }
}

#[derive(Debug, Default)]
struct FieldVisitor {
    message: Option<String>,
    attributes: Vec<KeyValue>,
}

impl FieldVisitor {
    fn push(&mut self, field: &Field, value: AttributeValue) {
        if field.name() == MESSAGE_FIELD {
            self.message = Some(value.to_string());
        } else {
            self.attributes.push(KeyValue { key: field.name().into(), value });
        }
    }
}

impl Visit for FieldVisitor {
    fn record_i64(&mut self, field: &Field, value: i64) {
        self.push(field, value.into());
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.push(field, value.into());
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        self.push(field, value.into());
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.push(field, value.into());
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.push(field, value.into());
    }

    fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
        self.push(field, value.to_string().into());
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.push(field, format!("{value:?}").into());
    }
}
