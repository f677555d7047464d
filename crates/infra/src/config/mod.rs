//! Configuration loading
//!
//! Reads [`TelemetryConfig`](meterline_domain::TelemetryConfig) from
//! environment variables and files.

pub mod loader;

// Re-export commonly used items
pub use loader::{find_config_file, load, load_from_env, load_from_file};
