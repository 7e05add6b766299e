/**
 * Document Store Loading
 *
 * This module pulls the authored document set (version marker, middlewares,
 * routes, components) into the in-memory snapshot the server works from.
 *
 * # Sources
 *
 * Documents are authored by an external collaborator and stored in
 * PostgreSQL, one JSONB document per row. When no database is configured
 * the server reads a JSON seed file with the same bundle shape instead, so
 * development and tests never require a running database.
 *
 * # Error Handling
 *
 * Load failures are logged and degrade: a failing database falls back to
 * the seed file, a missing seed file yields an empty document set. A
 * malformed individual document is skipped, never fatal.
 */

use sqlx::PgPool;

use crate::backend::server::state::DocumentSet;
use crate::shared::document::DocumentBundle;

/// Load the document snapshot from the configured source.
///
/// Tries the database first when a pool is available, then the seed file.
pub async fn load_documents(pool: Option<&PgPool>, seed_path: &str) -> DocumentSet {
    if let Some(pool) = pool {
        match load_from_database(pool).await {
            Ok(set) => {
                tracing::info!(
                    version = %set.version,
                    middlewares = set.middlewares.len(),
                    routes = set.routes.len(),
                    components = set.components.len(),
                    "document snapshot loaded from database"
                );
                return set;
            }
            Err(e) => {
                tracing::error!("Failed to load documents from database: {:?}", e);
                tracing::warn!("Falling back to seed file");
            }
        }
    }
    load_from_seed(seed_path)
}

/// Load all four document kinds from PostgreSQL.
///
/// Each table stores one JSONB document per row; the `variables` table is
/// plain key/value and carries the version marker.
async fn load_from_database(pool: &PgPool) -> Result<DocumentSet, sqlx::Error> {
    let version: Option<(String,)> =
        sqlx::query_as("SELECT value FROM variables WHERE key = 'version'")
            .fetch_optional(pool)
            .await?;
    let version = version.map(|row| row.0).unwrap_or_default();

    let middleware_docs: Vec<(serde_json::Value,)> =
        sqlx::query_as("SELECT doc FROM middlewares")
            .fetch_all(pool)
            .await?;
    let route_docs: Vec<(serde_json::Value,)> = sqlx::query_as("SELECT doc FROM routes")
        .fetch_all(pool)
        .await?;
    let component_docs: Vec<(serde_json::Value,)> = sqlx::query_as("SELECT doc FROM components")
        .fetch_all(pool)
        .await?;

    let middlewares = parse_docs(middleware_docs, "middleware");
    let routes = parse_docs(route_docs, "route");
    let components = parse_docs(component_docs, "component");

    Ok(DocumentSet::new(version, middlewares, routes, components))
}

/// Parse a list of raw JSONB rows, skipping malformed documents.
fn parse_docs<T: serde::de::DeserializeOwned>(
    rows: Vec<(serde_json::Value,)>,
    kind: &str,
) -> Vec<T> {
    rows.into_iter()
        .filter_map(|(doc,)| match serde_json::from_value(doc) {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                tracing::warn!("Skipping malformed {} document: {}", kind, e);
                None
            }
        })
        .collect()
}

/// Load the snapshot from the JSON seed file.
///
/// A missing or malformed file yields an empty set; the server still
/// starts and answers the handshake with version `"0"`.
pub fn load_from_seed(path: &str) -> DocumentSet {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) => {
            tracing::warn!("Seed file '{}' not readable ({}); starting empty", path, e);
            return DocumentSet::empty();
        }
    };
    match serde_json::from_str::<DocumentBundle>(&raw) {
        Ok(bundle) => {
            tracing::info!(
                version = %bundle.version,
                routes = bundle.routes.len(),
                "document snapshot loaded from seed file"
            );
            DocumentSet::new(
                bundle.version,
                bundle.middlewares,
                bundle.routes,
                bundle.components,
            )
        }
        Err(e) => {
            tracing::error!("Seed file '{}' is malformed: {}", path, e);
            DocumentSet::empty()
        }
    }
}
