//! Handler Module
//!
//! HTTP request handlers for the backend server:
//!
//! - **`ping`** - version handshake and health signal
//! - **`init`** - the frontend document bundle
//! - **`api`** - dynamically defined API routes
//! - **`host`** - the script capability host installed on the server
//!
//! All structured response bodies leave through [`sealed_response`], which
//! wraps them in the cipher envelope keyed by the requesting device's
//! secret.

/// Dynamic API route dispatch
pub mod api;

/// Script capability host for server-side execution
pub mod host;

/// Frontend document bundle
pub mod init;

/// Version handshake
pub mod ping;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::Value;

use crate::backend::error::BackendError;
use crate::shared::envelope;

/// Seal a payload for the requesting device and build the response.
pub fn sealed_response(
    status: StatusCode,
    secret: &str,
    payload: &Value,
) -> Result<Response, BackendError> {
    let sealed = envelope::seal(secret, payload)?;
    Ok((status, Json(sealed)).into_response())
}

/// The generic not-found body for unmatched dynamic routes.
pub fn not_found_response(secret: &str) -> Result<Response, BackendError> {
    sealed_response(
        StatusCode::NOT_FOUND,
        secret,
        &serde_json::json!({"message": "endpoint not found"}),
    )
}

/// The generic failure body for faulted route scripts.
pub fn internal_error_response(secret: &str) -> Result<Response, BackendError> {
    sealed_response(
        StatusCode::INTERNAL_SERVER_ERROR,
        secret,
        &serde_json::json!({"message": "internal server error"}),
    )
}
