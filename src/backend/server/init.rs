/**
 * Server Initialization
 *
 * This module handles the initialization and setup of the Axum HTTP server,
 * including state creation, document store loading, and route configuration.
 *
 * # Initialization Process
 *
 * The server initialization follows these steps:
 * 1. Load optional services (document store database)
 * 2. Pull the document snapshot (database or seed file)
 * 3. Create the shared script store and environment snapshot
 * 4. Create and configure the router
 *
 * # Error Handling
 *
 * The function is designed to be resilient:
 * - Missing database: server continues from the seed file
 * - Missing seed file: server starts with an empty document set
 */

use axum::Router;
use serde_json::{Map, Value};
use std::sync::Arc;

use crate::backend::documents::load_documents;
use crate::backend::routes::router::create_router;
use crate::backend::server::config::{load_database, ServerConfig};
use crate::backend::server::state::AppState;
use crate::shared::script::new_store;

/// Create and configure the Axum application
///
/// # Returns
///
/// Configured Axum Router ready to serve requests
pub async fn create_app() -> Router<()> {
    tracing::info!("Initializing pagewright backend server");

    let config = ServerConfig::from_env();

    // Step 1: Load optional services
    let db_pool = load_database().await;

    // Step 2: Pull the immutable-for-the-session document snapshot
    let documents = load_documents(db_pool.as_ref(), &config.seed_path).await;
    tracing::info!(version = %documents.version, "document snapshot ready");

    // Step 3: Shared script store and environment snapshot
    let env: Map<String, Value> = std::env::vars()
        .map(|(key, value)| (key, Value::String(value)))
        .collect();

    let app_state = AppState {
        documents: Arc::new(documents),
        store: new_store(),
        db_pool,
        env: Arc::new(env),
    };

    // Step 4: Create router with all routes
    create_router(app_state)
}
