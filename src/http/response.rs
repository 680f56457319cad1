//! Error responses.
//!
//! # Responsibilities
//! - Carry a machine-readable code, message, HTTP status and optional details
//! - Render as a JSON body with the matching status
//! - Report the failure to the access log through the response extensions

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Error text left on a response for the access log to pick up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedError(pub String);

/// An error surfaced to HTTP clients.
#[derive(Debug, Clone, Error, Serialize)]
#[error("{message}")]
pub struct AppError {
    pub code: &'static str,
    pub message: String,
    #[serde(skip)]
    pub status: StatusCode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl AppError {
    pub fn new(code: &'static str, message: impl Into<String>, status: StatusCode) -> Self {
        Self {
            code,
            message: message.into(),
            status,
            details: None,
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new("NOT_FOUND", message, StatusCode::NOT_FOUND)
    }

    pub fn validation(message: impl Into<String>, details: serde_json::Value) -> Self {
        Self {
            details: Some(details),
            ..Self::new("VALIDATION_ERROR", message, StatusCode::BAD_REQUEST)
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new("UNAUTHORIZED", message, StatusCode::UNAUTHORIZED)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new("FORBIDDEN", message, StatusCode::FORBIDDEN)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(
            "INTERNAL_SERVER_ERROR",
            message,
            StatusCode::INTERNAL_SERVER_ERROR,
        )
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let recorded = RecordedError(self.message.clone());
        let mut response = (self.status, Json(&self)).into_response();
        response.extensions_mut().insert(recorded);
        response
    }
}
