//! Subsystem adapters
//!
//! Each adapter maps one library's native hook points onto the shared
//! [`meterline_core::OperationObserver`] pattern and emits under its own
//! metric basename:
//!
//! | adapter | basename |
//! |---|---|
//! | [`orm::OrmMetrics`] | `orm` |
//! | [`http::HttpMetricsLayer`] | `http` |
//! | [`tcp::TcpMetrics`] | `tcp`, `tcp_live` |
//! | [`kv::KvMetrics`] | `kv` |
//! | [`docstore::CommandMonitor`] | `docstore` |
//!
//! No adapter ever fails the operation it observes.

pub mod docstore;
pub mod http;
pub mod kv;
pub mod orm;
pub mod tcp;

pub use docstore::CommandMonitor;
pub use http::{HttpMetrics, HttpMetricsLayer};
pub use kv::KvMetrics;
pub use orm::{OrmCommand, OrmMetrics, OrmOperation, StatementInfo};
pub use tcp::TcpMetrics;
