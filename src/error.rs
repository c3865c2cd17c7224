//! Error handling module
//!
//! Provides unified error types and handling for the entire application.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

/// Application-wide error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] tokio_postgres::Error),

    #[error("Pool error: {0}")]
    Pool(#[from] deadpool_postgres::PoolError),

    /// Bad caller input, reported against a single field
    #[error("Validation error: {field}: {message}")]
    Validation { field: String, message: String },

    /// Stale or unknown item id; the caller should refresh its view
    #[error("Not found: {0}")]
    NotFound(String),

    /// The permission gate denied modify rights for a scope
    #[error("Permission denied: {message}")]
    Permission { message: String, errors: Vec<String> },

    /// Catalog directory or description model unreachable or erroring
    #[error("External failure: {0}")]
    External(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl AppError {
    /// Whether the error came from an external collaborator rather than the caller
    pub fn is_external(&self) -> bool {
        matches!(self, AppError::External(_))
    }
}

/// Error response structure
#[derive(Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let mut field = None;
        let mut errors = Vec::new();

        let (status, error_code, message, details) = match self {
            AppError::Database(e) => {
                error!("Database error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "DATABASE_ERROR",
                    "A database error occurred".to_string(),
                    Some(e.to_string()),
                )
            }
            AppError::Pool(e) => {
                error!("Pool error: {:?}", e);
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "POOL_EXHAUSTED",
                    "Database connection pool exhausted".to_string(),
                    Some(e.to_string()),
                )
            }
            AppError::Validation { field: f, message } => {
                field = Some(f);
                (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", message, None)
            }
            // Surfaced as a conflict: the item was transitioned by someone else
            AppError::NotFound(msg) => (StatusCode::CONFLICT, "NOT_FOUND", msg, None),
            AppError::Permission { message, errors: e } => {
                errors = e;
                (StatusCode::FORBIDDEN, "PERMISSION_DENIED", message, None)
            }
            AppError::External(msg) => {
                error!("External failure: {}", msg);
                (
                    StatusCode::BAD_GATEWAY,
                    "EXTERNAL_FAILURE",
                    "An external service failed".to_string(),
                    Some(msg),
                )
            }
            AppError::Internal(msg) => {
                error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal error occurred".to_string(),
                    Some(msg),
                )
            }
            AppError::Config(msg) => {
                error!("Configuration error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "CONFIG_ERROR",
                    "A configuration error occurred".to_string(),
                    Some(msg),
                )
            }
        };

        let body = Json(ErrorResponse {
            success: false,
            message,
            error: details,
            code: Some(error_code.to_string()),
            field,
            errors,
        });

        (status, body).into_response()
    }
}

/// Result type alias for API handlers
pub type ApiResult<T> = Result<T, AppError>;

/// Helper function to create a validation error
pub fn validation_error(field: impl Into<String>, msg: impl Into<String>) -> AppError {
    AppError::Validation {
        field: field.into(),
        message: msg.into(),
    }
}

/// Convert `validator` output into a field-level validation error
pub fn from_validation_errors(errors: validator::ValidationErrors) -> AppError {
    let first = errors
        .field_errors()
        .into_iter()
        .next()
        .map(|(field, errs)| {
            let message = errs
                .first()
                .and_then(|e| e.message.as_ref().map(|m| m.to_string()))
                .unwrap_or_else(|| format!("{} is invalid", field));
            (field.to_string(), message)
        });

    match first {
        Some((field, message)) => AppError::Validation { field, message },
        None => validation_error("request", errors.to_string()),
    }
}
