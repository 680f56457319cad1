//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate level names and the bind address
//! - Validate value ranges (timeouts > 0)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: AppConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::AppConfig;
use crate::observability::level::Level;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("logging.{field}: unknown level {value:?}")]
    UnknownLevel { field: &'static str, value: String },

    #[error("server.bind_address: {0:?} is not a socket address")]
    BindAddress(String),

    #[error("server.request_timeout_secs must be greater than zero")]
    ZeroTimeout,

    #[error("logging.output_paths must name at least one output")]
    NoOutputs,

    #[error("logging.output_paths: empty path")]
    EmptyPath,
}

/// Check a parsed configuration for semantic errors.
pub fn validate_config(config: &AppConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.server.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BindAddress(
            config.server.bind_address.clone(),
        ));
    }
    if config.server.request_timeout_secs == 0 {
        errors.push(ValidationError::ZeroTimeout);
    }

    let logging = &config.logging;
    if logging.level.parse::<Level>().is_err() {
        errors.push(ValidationError::UnknownLevel {
            field: "level",
            value: logging.level.clone(),
        });
    }
    if let Some(file_level) = &logging.file_level {
        if file_level.parse::<Level>().is_err() {
            errors.push(ValidationError::UnknownLevel {
                field: "file_level",
                value: file_level.clone(),
            });
        }
    }
    if logging.output_paths.is_empty() && !logging.development {
        errors.push(ValidationError::NoOutputs);
    }
    if logging.output_paths.iter().any(|p| p.trim().is_empty()) {
        errors.push(ValidationError::EmptyPath);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
