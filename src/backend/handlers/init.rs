/**
 * Init Bundle Handler
 *
 * This module implements GET /init, which hands a client the complete
 * frontend document bundle for its local sync cache.
 *
 * # Bundle Shape
 *
 * Only frontend documents ship: backend routes and middlewares stay on the
 * server. The `for` field is stripped from the wire form (frontend
 * documents serialize without it), matching what clients store.
 */

use axum::{extract::State, http::StatusCode, response::Response};

use crate::backend::error::BackendError;
use crate::backend::handlers::sealed_response;
use crate::backend::middleware::Device;
use crate::backend::server::state::AppState;
use crate::shared::document::DocumentBundle;

/// Init handler
///
/// Returns the versioned frontend bundle, sealed for the requesting device.
pub async fn init_bundle(
    State(state): State<AppState>,
    Device(identity): Device,
) -> Result<Response, BackendError> {
    let documents = &state.documents;

    let bundle = DocumentBundle {
        version: documents.version.clone(),
        middlewares: documents
            .middlewares
            .iter()
            .filter(|middleware| middleware.audience.is_fe())
            .cloned()
            .collect(),
        routes: documents
            .routes
            .iter()
            .filter(|route| route.audience.is_fe())
            .cloned()
            .collect(),
        components: documents.components.clone(),
    };

    tracing::debug!(
        device_id = %identity.device_id,
        version = %bundle.version,
        routes = bundle.routes.len(),
        "serving init bundle"
    );

    let payload = serde_json::to_value(&bundle)?;
    sealed_response(StatusCode::OK, &identity.secret, &payload)
}
