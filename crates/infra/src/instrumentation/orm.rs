//! Database ORM adapter
//!
//! ORMs expose callback chains per statement kind with "before" and "after"
//! slots. The before callback returns an [`OrmOperation`] token which the
//! ORM carries on its statement and hands back to the after callback
//! together with a [`StatementInfo`].

use std::fmt;

use meterline_core::{EmitContext, Metrics, OperationObserver, OperationRecorder, OperationStart};
use meterline_domain::KeyValue;

/// Metric basename for ORM statements
pub const ORM_METRIC: &str = "orm";

/// Statement kind with its own callback chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OrmCommand {
    Create,
    Query,
    Update,
    Delete,
}

impl OrmCommand {
    /// Every command, in registration order
    pub const ALL: [Self; 4] = [Self::Create, Self::Query, Self::Update, Self::Delete];

    /// Lowercase command name, used as the `command` attribute
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Query => "query",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }

    /// Name to register the before callback under
    pub fn before_callback_name(self) -> String {
        format!("metrics.{}.before", self.as_str())
    }

    /// Name to register the after callback under
    pub fn after_callback_name(self) -> String {
        format!("metrics.{}.after", self.as_str())
    }
}

impl fmt::Display for OrmCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Token created by the before callback
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrmOperation {
    pub command: OrmCommand,
    pub start: OperationStart,
}

/// What the after callback knows about the finished statement
#[derive(Debug, Clone, Default)]
pub struct StatementInfo {
    /// Target table; `None` when the statement has no resolved schema
    pub table: Option<String>,
    /// Database driver name
    pub driver: String,
    /// Error text, if the statement failed
    pub error: Option<String>,
    /// Caller context the statement ran under
    pub ctx: EmitContext,
}

/// ORM statement timing
#[derive(Debug, Clone)]
pub struct OrmMetrics {
    recorder: OperationRecorder,
}

impl OrmMetrics {
    /// Adapter emitting to `metrics`
    pub fn new(metrics: Metrics) -> Self {
        Self { recorder: OperationRecorder::new(metrics, ORM_METRIC) }
    }

    /// Before callback
    pub fn before(&self, command: OrmCommand) -> OrmOperation {
        OrmOperation { command, start: OperationStart::now() }
    }

    /// After callback
    ///
    /// Statements without a table and calls without a token are skipped.
    pub fn after(&self, token: Option<OrmOperation>, statement: &StatementInfo) {
        let Some(table) = statement.table.as_deref() else {
            return;
        };
        let Some(operation) = token else {
            tracing::debug!(table, "ORM after-callback without start token");
            return;
        };

        let attrs = [
            KeyValue::new("table", table),
            KeyValue::new("success", statement.error.is_none()),
            KeyValue::new("command", operation.command.as_str()),
            KeyValue::new("driver", statement.driver.as_str()),
        ];
        self.recorder.record(&statement.ctx, operation.start, &attrs);
    }
}

impl OperationObserver for OrmMetrics {
    type Operation = OrmCommand;
    type Token = OrmOperation;
    type Outcome = StatementInfo;

    fn on_start(&self, operation: Self::Operation) -> Self::Token {
        self.before(operation)
    }

    fn on_finish(&self, token: Option<Self::Token>, outcome: Self::Outcome) {
        self.after(token, &outcome);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use meterline_core::testing::InMemorySink;
    use meterline_domain::{AttributeValue, ProcessIdentity};

    use super::*;

    fn adapter(sink: &InMemorySink) -> OrmMetrics {
        OrmMetrics::new(Metrics::new(
            Arc::new(sink.clone()),
            Arc::new(ProcessIdentity::new("shop", "1.0.0", "test", "db-host")),
        ))
    }

    fn statement(table: Option<&str>, error: Option<&str>) -> StatementInfo {
        StatementInfo {
            table: table.map(str::to_owned),
            driver: "postgres".to_owned(),
            error: error.map(str::to_owned),
            ctx: EmitContext::background(),
        }
    }

    #[test]
    fn test_callback_names() {
        let names: Vec<_> = OrmCommand::ALL.iter().map(|c| c.before_callback_name()).collect();
        assert_eq!(
            names,
            [
                "metrics.create.before",
                "metrics.query.before",
                "metrics.update.before",
                "metrics.delete.before",
            ]
        );
        assert_eq!(OrmCommand::Delete.after_callback_name(), "metrics.delete.after");
    }

    #[test]
    fn test_statement_records_time_and_count() {
        let sink = InMemorySink::new();
        let orm = adapter(&sink);

        let token = orm.before(OrmCommand::Update);
        orm.after(Some(token), &statement(Some("orders"), None));

        assert_eq!(sink.histogram_samples("shop_orm").len(), 1);
        assert_eq!(sink.counter_total("shop_orm"), 1);

        let measurement = sink.measurements().pop().unwrap();
        assert_eq!(measurement.attribute("table"), Some(&AttributeValue::from("orders")));
        assert_eq!(measurement.attribute("command"), Some(&AttributeValue::from("update")));
        assert_eq!(measurement.attribute("driver"), Some(&AttributeValue::from("postgres")));
        assert_eq!(measurement.attribute("success"), Some(&AttributeValue::Bool(true)));
    }

    #[test]
    fn test_failed_statement_is_unsuccessful() {
        let sink = InMemorySink::new();
        let orm = adapter(&sink);

        let token = orm.before(OrmCommand::Create);
        orm.after(Some(token), &statement(Some("orders"), Some("duplicate key")));

        let measurement = sink.measurements().pop().unwrap();
        assert_eq!(measurement.attribute("success"), Some(&AttributeValue::Bool(false)));
    }

    #[test]
    fn test_statement_without_schema_is_skipped() {
        let sink = InMemorySink::new();
        let orm = adapter(&sink);

        orm.after(Some(orm.before(OrmCommand::Query)), &statement(None, None));
        assert_eq!(sink.measurement_count(), 0);
    }

    #[test]
    fn test_missing_token_is_skipped() {
        let sink = InMemorySink::new();
        let orm = adapter(&sink);

        orm.after(None, &statement(Some("orders"), None));
        assert_eq!(sink.measurement_count(), 0);
    }

    #[test]
    fn test_observe_returns_statement_result() {
        let sink = InMemorySink::new();
        let orm = adapter(&sink);

        let rows = orm.observe(OrmCommand::Query, || Ok::<u64, String>(3), |result| {
            statement(Some("users"), result.as_ref().err().map(String::as_str))
        });

        assert_eq!(rows, Ok(3));
        assert_eq!(sink.counter_total("shop_orm"), 1);
    }
}
