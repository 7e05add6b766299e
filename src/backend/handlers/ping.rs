/**
 * Ping Handler
 *
 * This module implements the liveness/version handshake for GET /ping.
 *
 * # Handshake
 *
 * The response carries the current document-set version and the server's
 * health signal. Clients compare the version against their cached marker
 * and pull the full bundle from /init on mismatch.
 */

use axum::{extract::State, http::StatusCode, response::Response};

use crate::backend::error::BackendError;
use crate::backend::handlers::sealed_response;
use crate::backend::middleware::Device;
use crate::backend::server::state::AppState;

/// Ping handler
///
/// Returns the current document-set version and a health signal, sealed
/// for the requesting device.
pub async fn ping(
    State(state): State<AppState>,
    Device(identity): Device,
) -> Result<Response, BackendError> {
    let payload = serde_json::json!({
        "version": state.documents.version,
        "status": "ok",
        "time": chrono::Utc::now().to_rfc3339(),
    });
    sealed_response(StatusCode::OK, &identity.secret, &payload)
}
