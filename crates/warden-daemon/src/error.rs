//! Error types for warden-daemon

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use warden_health::HealthError;
use warden_state::StateError;

/// Daemon-level errors
#[derive(Debug, Error)]
pub enum DaemonError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Desired-state provider error
    #[error("Desired-state provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Health monitor error
    #[error("Health monitor error: {0}")]
    Health(#[from] HealthError),

    /// State store error
    #[error("State store error: {0}")]
    State(#[from] StateError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Desired-state provider errors
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Database connection or query failure
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A row did not carry the expected columns
    #[error("Invalid row: {0}")]
    InvalidRow(String),

    /// Provider is temporarily unavailable
    #[error("Unavailable: {0}")]
    Unavailable(String),
}

/// API-specific errors
#[derive(Debug, Error)]
pub enum ApiError {
    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<HealthError> for ApiError {
    fn from(e: HealthError) -> Self {
        ApiError::Internal(e.to_string())
    }
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        };

        let body = ErrorResponse {
            error: self.to_string(),
            code: code.to_string(),
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for API operations
pub type ApiResult<T> = Result<T, ApiError>;

/// Result type alias for provider operations
pub type ProviderResult<T> = Result<T, ProviderError>;

/// Result type alias for daemon operations
pub type DaemonResult<T> = Result<T, DaemonError>;
