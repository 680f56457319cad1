//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

use crate::observability::encoder::Encoder;

/// Root configuration for the service.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// HTTP server settings.
    pub server: ServerConfig,

    /// Logging settings.
    pub logging: LogConfig,
}

/// HTTP server configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Request timeout (total time for request/response) in seconds.
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            request_timeout_secs: 30,
        }
    }
}

/// Record encoding for console outputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogEncoding {
    #[default]
    Json,
    Console,
}

impl LogEncoding {
    pub fn encoder(&self, color: bool) -> Encoder {
        match self {
            LogEncoding::Json => Encoder::Json,
            LogEncoding::Console => Encoder::Console { color },
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LogConfig {
    /// Colorized human-readable output on stdout.
    pub development: bool,

    /// Minimum level (debug, info, warn, error, panic, fatal).
    pub level: String,

    /// Minimum level for file outputs; falls back to `level`.
    pub file_level: Option<String>,

    /// Encoding for `stdout`/`stderr` outputs outside development mode.
    pub encoding: LogEncoding,

    /// "stdout", "stderr", or a file path (rotated).
    pub output_paths: Vec<String>,

    /// Where the logger reports its own write failures.
    pub error_output_paths: Vec<String>,

    /// Omit `caller` from records.
    pub disable_caller: bool,

    /// Omit `stacktrace` from error records.
    pub disable_stacktrace: bool,

    /// Rotation policy, applied separately to each file output.
    pub rotation: RotationConfig,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            development: false,
            level: "info".to_string(),
            file_level: None,
            encoding: LogEncoding::Json,
            output_paths: vec!["stdout".to_string()],
            error_output_paths: vec!["stderr".to_string()],
            disable_caller: false,
            disable_stacktrace: false,
            rotation: RotationConfig::default(),
        }
    }
}

/// Log file rotation policy.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RotationConfig {
    /// Rotate once the file would exceed this size (0 = 100 MB).
    pub max_size_mb: u64,

    /// Rotated files to keep (0 = keep all).
    pub max_backups: usize,

    /// Days to keep rotated files (0 = no age limit).
    pub max_age_days: u32,

    /// Gzip rotated files.
    pub compress: bool,
}

impl Default for RotationConfig {
    fn default() -> Self {
        Self {
            max_size_mb: 100,
            max_backups: 3,
            max_age_days: 28,
            compress: false,
        }
    }
}
