//! # Meterline Domain
//!
//! Plain data types shared by every Meterline crate.
//!
//! This crate contains:
//! - Telemetry configuration structures
//! - Process identity (service name, version, environment, host)
//! - The attribute key/value model used by metrics and logs
//! - Domain error types and Result definitions
//!
//! ## Architecture
//! - No dependencies on other Meterline crates
//! - Only external dependencies allowed
//! - Pure data structures, no I/O

pub mod attributes;
pub mod config;
pub mod errors;
pub mod identity;

// Re-export commonly used items
pub use attributes::{AttributeValue, KeyValue};
pub use config::TelemetryConfig;
pub use errors::*;
pub use identity::{normalize_app_name, ProcessIdentity};
