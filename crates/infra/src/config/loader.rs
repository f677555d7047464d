//! Configuration loader
//!
//! Loads the telemetry configuration from environment variables or files.
//!
//! ## Loading Strategy
//! 1. Reads a `.env` file into the environment, if one exists
//! 2. Loads from environment variables when `METERLINE_APP_NAME` is set
//! 3. Otherwise searches multiple paths for a config file
//! 4. Supports JSON and TOML formats
//!
//! ## Environment Variables
//! - `METERLINE_APP_NAME`: Application name (required for env loading)
//! - `METERLINE_VERSION`: Application version
//! - `METERLINE_ENV`: Deployment environment label
//! - `METERLINE_METRICS_ENDPOINT`: DogStatsD agent address (`host:port`)
//! - `METERLINE_LOG_ENDPOINT`: Log collector address
//! - `METERLINE_USE_METRICS`: Enable the metrics pipeline (true/false)
//! - `METERLINE_USE_LOGGER`: Enable the logging pipeline (true/false)
//! - `METERLINE_HOST_NAME`: Host name override
//!
//! Unset optional variables keep their [`TelemetryConfig::default`] value.
//!
//! ## File Locations
//! The loader searches the following paths (in order):
//! 1. `./meterline.json` or `./meterline.toml` (current working directory)
//! 2. `./telemetry.json` or `./telemetry.toml` (current working directory)
//! 3. The same names one and two directories up
//! 4. The same names next to the executable

use std::path::{Path, PathBuf};

use meterline_domain::{Result, TelemetryConfig, TelemetryError};

const FILE_STEMS: [&str; 2] = ["meterline", "telemetry"];
const FILE_EXTENSIONS: [&str; 2] = ["json", "toml"];

/// Load configuration with automatic fallback strategy
///
/// # Errors
/// Returns `TelemetryError::Config` if:
/// - Configuration cannot be loaded from either source
/// - File format is invalid
pub fn load() -> Result<TelemetryConfig> {
    match dotenvy::dotenv() {
        Ok(path) => tracing::debug!(path = %path.display(), "Loaded .env file"),
        Err(e) => tracing::trace!(error = %e, "No .env file loaded"),
    }

    match load_from_env() {
        Ok(config) => {
            tracing::info!("Telemetry configuration loaded from environment variables");
            Ok(config)
        }
        Err(e) => {
            tracing::debug!(error = %e, "Failed to load from environment, trying file");
            load_from_file(None)
        }
    }
}

/// Load configuration from environment variables
///
/// # Errors
/// Returns `TelemetryError::Config` if `METERLINE_APP_NAME` is missing.
pub fn load_from_env() -> Result<TelemetryConfig> {
    let defaults = TelemetryConfig::default();

    Ok(TelemetryConfig {
        app_name: env_var("METERLINE_APP_NAME")?,
        version: env_or("METERLINE_VERSION", defaults.version),
        env: env_or("METERLINE_ENV", defaults.env),
        metrics_endpoint: env_or("METERLINE_METRICS_ENDPOINT", defaults.metrics_endpoint),
        log_endpoint: env_or("METERLINE_LOG_ENDPOINT", defaults.log_endpoint),
        use_metrics: env_bool("METERLINE_USE_METRICS", defaults.use_metrics),
        use_logger: env_bool("METERLINE_USE_LOGGER", defaults.use_logger),
        host_name: std::env::var("METERLINE_HOST_NAME").ok().filter(|h| !h.trim().is_empty()),
    })
}

/// Load configuration from a file
///
/// If `path` is `None`, searches the standard locations via
/// [`find_config_file`]. Format is detected by file extension.
///
/// # Errors
/// Returns `TelemetryError::Config` if:
/// - File not found (when path is specified)
/// - No config file found (when path is `None`)
/// - File format is invalid
pub fn load_from_file(path: Option<PathBuf>) -> Result<TelemetryConfig> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(TelemetryError::Config(format!(
                    "Config file not found: {}",
                    p.display()
                )));
            }
            p
        }
        None => find_config_file().ok_or_else(|| {
            TelemetryError::Config(
                "No config file found in any of the standard locations".to_string(),
            )
        })?,
    };

    tracing::info!(path = %config_path.display(), "Loading telemetry configuration from file");

    let contents = std::fs::read_to_string(&config_path)
        .map_err(|e| TelemetryError::Config(format!("Failed to read config file: {e}")))?;

    parse_config(&contents, &config_path)
}

/// Parse configuration from string content, choosing the format by extension
fn parse_config(contents: &str, path: &Path) -> Result<TelemetryConfig> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

    match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| TelemetryError::Config(format!("Invalid TOML format: {e}"))),
        "json" => serde_json::from_str(contents)
            .map_err(|e| TelemetryError::Config(format!("Invalid JSON format: {e}"))),
        _ => Err(TelemetryError::Config(format!("Unsupported config format: {extension}"))),
    }
}

/// Search the standard locations for a configuration file
///
/// Returns the first existing candidate.
pub fn find_config_file() -> Option<PathBuf> {
    let mut roots = Vec::new();

    if let Ok(cwd) = std::env::current_dir() {
        roots.extend([cwd.clone(), cwd.join(".."), cwd.join("../..")]);
    }
    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            roots.extend([exe_dir.to_path_buf(), exe_dir.join("..")]);
        }
    }

    roots
        .iter()
        .flat_map(|root| {
            FILE_STEMS.iter().flat_map(move |stem| {
                FILE_EXTENSIONS.iter().map(move |ext| root.join(format!("{stem}.{ext}")))
            })
        })
        .find(|path| path.exists())
}

/// Get required environment variable
fn env_var(key: &str) -> Result<String> {
    std::env::var(key).map_err(|_| {
        TelemetryError::Config(format!("Missing required environment variable: {key}"))
    })
}

/// Get optional environment variable, falling back to `default`
fn env_or(key: &str, default: String) -> String {
    std::env::var(key).ok().filter(|v| !v.is_empty()).unwrap_or(default)
}

/// Parse boolean from environment variable
///
/// Accepts: `1`/`0`, `true`/`false`, `yes`/`no`, `on`/`off` (case-insensitive).
/// Returns `default` if the variable is not set.
fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map(|s| matches!(s.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(default)
}
