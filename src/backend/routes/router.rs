/**
 * Router Configuration
 *
 * This module provides the main router creation function that combines
 * all route configurations into a single Axum router.
 *
 * # Route Order
 *
 * Routes are added in a specific order to ensure proper matching:
 * 1. Handshake endpoints (/ping, /init)
 * 2. The dynamic /api prefix (all methods; stored documents decide what exists)
 * 3. Static assets under /static
 * 4. Fallback handler (404)
 *
 * # Layers
 *
 * The device-identity middleware wraps everything, and a permissive CORS
 * layer sits outermost so preflights never reach the identity check.
 */

use axum::{middleware, routing, Router};
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;

use crate::backend::handlers::api::dispatch;
use crate::backend::handlers::init::init_bundle;
use crate::backend::handlers::ping::ping;
use crate::backend::middleware::device::device_middleware;
use crate::backend::server::state::AppState;

/// Create the Axum router with all routes configured
///
/// # Arguments
///
/// * `app_state` - Application state containing the document snapshot
///
/// # Returns
///
/// Configured Axum Router ready to serve requests
///
/// # Route Details
///
/// - `GET /ping` - version handshake and health signal
/// - `GET /init` - frontend document bundle
/// - `ANY /api` and `ANY /api/{*path}` - dynamically defined API routes
/// - `/static/*` - static assets (exempt from the device header check)
/// - anything else - 404
pub fn create_router(app_state: AppState) -> Router<()> {
    let router = Router::new()
        .route("/ping", routing::get(ping))
        .route("/init", routing::get(init_bundle))
        .route("/api", routing::any(dispatch))
        .route("/api/{*path}", routing::any(dispatch));

    // Static assets bypass the device check inside the middleware itself.
    let router = router.nest_service("/static", ServeDir::new("public"));

    // Fallback handler for 404
    let router = router.fallback(|| async { "404 Not Found" });

    router
        .layer(middleware::from_fn(device_middleware))
        .layer(CorsLayer::permissive())
        .with_state(app_state)
}
