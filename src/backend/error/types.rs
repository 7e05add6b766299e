/**
 * Backend Error Types
 *
 * This module defines error types specific to the backend server.
 * These errors are used in HTTP handlers and can be converted to HTTP responses.
 *
 * # Error Categories
 *
 * ## Handler Errors
 *
 * Handler errors occur when processing HTTP requests:
 * - Missing required headers
 * - Invalid request format
 *
 * ## Engine Errors
 *
 * Engine errors bubble up from the shared pipeline (cipher, routing,
 * template, sandbox) and carry their own fault kind; the HTTP status is
 * derived from that kind.
 */

use axum::http::StatusCode;
use thiserror::Error;

use crate::shared::error::EngineError;

/// Backend-specific error types
///
/// This enum represents all possible errors that can occur in the backend.
/// Each variant can be converted to an HTTP response.
///
/// # Usage
///
/// ```rust,ignore
/// use pagewright::backend::error::BackendError;
/// use axum::http::StatusCode;
///
/// let err = BackendError::handler(StatusCode::NOT_ACCEPTABLE, "device identifier required");
/// ```
#[derive(Debug, Error)]
pub enum BackendError {
    /// Handler error (e.g., missing headers, invalid request)
    #[error("Handler error: {message}")]
    HandlerError {
        /// HTTP status code for this error
        status: StatusCode,
        /// Human-readable error message
        message: String,
    },

    /// Fault raised by the shared resolution/execution pipeline
    #[error(transparent)]
    EngineError(#[from] EngineError),

    /// Database error
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

impl BackendError {
    /// Create a new handler error with a status code
    pub fn handler(status: StatusCode, message: impl Into<String>) -> Self {
        Self::HandlerError {
            status,
            message: message.into(),
        }
    }

    /// Get the HTTP status code for this error
    ///
    /// # Status Code Mapping
    ///
    /// - `HandlerError` - Uses the status code from the error
    /// - `EngineError::Decryption` - 400 Bad Request
    /// - `EngineError::Match` - 404 Not Found
    /// - `EngineError::Transport` - 502 Bad Gateway
    /// - everything else - 500 Internal Server Error
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::HandlerError { status, .. } => *status,
            Self::EngineError(err) => match err {
                EngineError::Decryption { .. } => StatusCode::BAD_REQUEST,
                EngineError::Match { .. } => StatusCode::NOT_FOUND,
                EngineError::Transport { .. } => StatusCode::BAD_GATEWAY,
                EngineError::Resolution { .. }
                | EngineError::Script { .. }
                | EngineError::Cache { .. }
                | EngineError::Serialization { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::DatabaseError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::SerializationError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the error message
    pub fn message(&self) -> String {
        match self {
            Self::HandlerError { message, .. } => message.clone(),
            Self::EngineError(err) => err.to_string(),
            Self::DatabaseError(err) => err.to_string(),
            Self::SerializationError(err) => err.to_string(),
        }
    }
}
