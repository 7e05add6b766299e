/**
 * Application State Management
 *
 * This module defines the application state structure and implements
 * the necessary `FromRef` traits for Axum state extraction.
 *
 * # Architecture
 *
 * The `AppState` struct serves as the central state container for the
 * application, holding:
 * - The immutable-for-the-session document snapshot
 * - The process-wide script store
 * - Optional services (document store database)
 * - An environment snapshot exposed to server route scripts
 *
 * # Thread Safety
 *
 * All state is designed to be thread-safe:
 * - `Arc<DocumentSet>` for the immutable document snapshot
 * - `SharedStore` (`Arc<RwLock<_>>`) for script state
 * - `Option<PgPool>` for the optional database
 */

use axum::extract::FromRef;
use serde_json::{Map, Value};
use sqlx::PgPool;
use std::sync::Arc;

use crate::shared::document::{Component, Middleware, Route};
use crate::shared::routing::RouteTable;
use crate::shared::script::SharedStore;

/// The document snapshot the server works from
///
/// Pulled once at startup and treated as immutable for the session, the
/// same way clients treat their cached bundle.
pub struct DocumentSet {
    /// Version marker for the whole set
    pub version: String,
    /// All middlewares, both audiences
    pub middlewares: Vec<Middleware>,
    /// All routes, both audiences
    pub routes: Vec<Route>,
    /// All components
    pub components: Vec<Component>,
    /// Backend routes with compiled patterns, in document order
    pub backend_table: RouteTable,
}

impl DocumentSet {
    /// Build a snapshot, compiling the backend route table.
    pub fn new(
        version: String,
        middlewares: Vec<Middleware>,
        routes: Vec<Route>,
        components: Vec<Component>,
    ) -> Self {
        let backend_routes: Vec<Route> = routes
            .iter()
            .filter(|route| !route.audience.is_fe())
            .cloned()
            .collect();
        Self {
            version,
            middlewares,
            routes,
            components,
            backend_table: RouteTable::new(backend_routes),
        }
    }

    /// An empty set with a zero version, used when nothing could be loaded.
    pub fn empty() -> Self {
        Self::new("0".to_string(), Vec::new(), Vec::new(), Vec::new())
    }
}

/// Application state shared across all request handlers
#[derive(Clone)]
pub struct AppState {
    /// Immutable document snapshot for this session
    pub documents: Arc<DocumentSet>,

    /// Process-wide store readable and mergeable by route scripts
    pub store: SharedStore,

    /// Document store connection pool
    ///
    /// `None` when `DATABASE_URL` is not configured; the snapshot then
    /// comes from the seed file and handlers never touch the database.
    pub db_pool: Option<PgPool>,

    /// Environment snapshot exposed to server route scripts as `req.env`
    pub env: Arc<Map<String, Value>>,
}

/// Implement FromRef for the document snapshot
///
/// This allows Axum handlers to extract `Arc<DocumentSet>` directly from
/// `AppState` without needing the entire state.
impl FromRef<AppState> for Arc<DocumentSet> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.documents.clone()
    }
}

/// Implement FromRef for Option<PgPool>
impl FromRef<AppState> for Option<PgPool> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.db_pool.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::document::Audience;
    use serde_json::json;

    #[test]
    fn test_backend_table_only_holds_backend_routes() {
        let routes = vec![
            Route {
                endpoint: "/home".into(),
                method: None,
                audience: Audience::FE,
                middlewares: vec![],
                view: json!({"title": "home", "render": {"element": "div"}}),
            },
            Route {
                endpoint: "/api/items".into(),
                method: Some("GET".into()),
                audience: Audience::BE,
                middlewares: vec![],
                view: json!("[\"do\"]"),
            },
        ];
        let set = DocumentSet::new("1".into(), vec![], routes, vec![]);
        assert!(set.backend_table.match_request("GET", "/api/items").is_some());
        assert!(set.backend_table.match_request("GET", "/home").is_none());
    }

    #[test]
    fn test_empty_set() {
        let set = DocumentSet::empty();
        assert_eq!(set.version, "0");
        assert!(set.routes.is_empty());
    }
}
