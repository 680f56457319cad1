//! Startup orchestration.
//!
//! # Responsibilities
//! - Load and validate configuration
//! - Build the logger and route `tracing` events into it
//! - Bind the listener last, once everything else is ready
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Subsystems initialize in order, not concurrently

use std::path::Path;

use thiserror::Error;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{load_config, AppConfig, ConfigError, LogConfig, ServerConfig};
use crate::observability::{LogError, LogLayer, Logger};

/// Filter applied to `tracing` events when `RUST_LOG` is unset.
pub const DEFAULT_TRACING_FILTER: &str = "api_skeleton=debug,tower_http=info,axum=info";

/// Errors that abort startup.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("logging: {0}")]
    Logging(#[from] LogError),

    #[error("failed to install tracing subscriber: {0}")]
    Subscriber(#[from] tracing_subscriber::util::TryInitError),

    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },
}

/// Load configuration from `path`, or fall back to defaults.
pub fn load(path: Option<&Path>) -> Result<AppConfig, StartupError> {
    match path {
        Some(path) => Ok(load_config(path)?),
        None => Ok(AppConfig::default()),
    }
}

/// Build the logger and make it the destination of all `tracing` events.
///
/// Must run once, before the server starts.
pub fn init_logging(config: &LogConfig) -> Result<Logger, StartupError> {
    let logger = Logger::new(config)?;

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(DEFAULT_TRACING_FILTER)),
        )
        .with(LogLayer::new(logger.clone()))
        .try_init()?;

    Ok(logger)
}

/// Bind the TCP listener for the HTTP server.
pub async fn bind(config: &ServerConfig) -> Result<TcpListener, StartupError> {
    TcpListener::bind(&config.bind_address)
        .await
        .map_err(|source| StartupError::Bind {
            address: config.bind_address.clone(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_without_path_uses_defaults() {
        let config = load(None).unwrap();
        assert_eq!(config.server.bind_address, "0.0.0.0:8080");
    }

    #[test]
    fn test_invalid_level_aborts_logging_init() {
        let config = LogConfig {
            level: "noisy".into(),
            ..LogConfig::default()
        };
        assert!(matches!(
            init_logging(&config),
            Err(StartupError::Logging(LogError::InvalidLevel(_)))
        ));
    }

    #[tokio::test]
    async fn test_bind_reports_address() {
        let config = ServerConfig {
            bind_address: "missing-port".into(),
            ..ServerConfig::default()
        };
        let err = bind(&config).await.unwrap_err();
        assert!(err.to_string().contains("missing-port"));
    }
}
