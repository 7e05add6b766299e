//! # Local Sync Cache
//!
//! This module provides the client's local SQLite store holding the latest
//! known document snapshot: routes, middlewares, components, and the
//! version marker that stamps the whole set.
//!
//! ## Architecture
//!
//! Four logical tables, each a small key-value surface:
//! - **variables**: `key -> value`, carrying the version marker and the
//!   persisted device identifier
//! - **middlewares**: unique by key
//! - **routes**: unique by endpoint
//! - **components**: unique by key
//!
//! Each table supports add/get/get-all/update/delete/clear. Scripts and
//! views are stored as cipher text, re-encrypted under the device secret
//! during ingest.
//!
//! ## Lazy Connection
//!
//! The underlying storage handle opens lazily and asynchronously. An
//! operation arriving before the first connection completes waits on a
//! short fixed backoff instead of failing, so early reads during boot are
//! safe.
//!
//! ## Key Components
//!
//! - `SyncCache`: connection manager and schema setup
//! - `variables.rs` / `middlewares.rs` / `routes.rs` / `components.rs`:
//!   per-table operations

pub mod components;
pub mod middlewares;
pub mod routes;
pub mod variables;

use sqlx::SqlitePool;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::shared::error::{EngineError, EngineResult};

pub use components::CachedComponent;
pub use middlewares::CachedMiddleware;
pub use routes::CachedRoute;

/// Fixed backoff between retries while the connection is still opening.
const CONNECT_BACKOFF: Duration = Duration::from_millis(10);

/// Local sync cache connection manager
///
/// Cheap to clone; all clones share the same lazily-opened pool.
#[derive(Clone, Debug)]
pub struct SyncCache {
    pool: Arc<RwLock<Option<SqlitePool>>>,
}

impl SyncCache {
    /// Open the cache at the platform data directory, lazily.
    ///
    /// Returns immediately; the connection is established in the
    /// background and operations wait for it.
    pub fn new_lazy() -> Self {
        Self::new_lazy_at(Self::default_db_path())
    }

    /// Open the cache at an explicit path, lazily.
    pub fn new_lazy_at(db_path: PathBuf) -> Self {
        let cache = Self {
            pool: Arc::new(RwLock::new(None)),
        };
        let handle = cache.clone();
        tokio::spawn(async move {
            match Self::connect(&db_path).await {
                Ok(pool) => {
                    *handle.pool.write().await = Some(pool);
                    tracing::info!("local sync cache connected at {}", db_path.display());
                }
                Err(e) => {
                    tracing::error!("failed to open local sync cache: {}", e);
                }
            }
        });
        cache
    }

    /// Open the cache and wait for the connection.
    pub async fn open(db_path: PathBuf) -> EngineResult<Self> {
        let pool = Self::connect(&db_path).await?;
        Ok(Self {
            pool: Arc::new(RwLock::new(Some(pool))),
        })
    }

    /// Platform-specific default path for the cache file.
    fn default_db_path() -> PathBuf {
        let mut path = dirs::data_dir().unwrap_or_else(std::env::temp_dir);
        path.push("pagewright");
        path.push("cache.db");
        path
    }

    /// Establish the pool and initialize the schema.
    async fn connect(db_path: &Path) -> EngineResult<SqlitePool> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| EngineError::cache(format!("cache directory: {}", e)))?;
        }

        let database_url = format!("sqlite:{}?mode=rwc", db_path.display());
        let pool = SqlitePool::connect(&database_url).await?;

        // WAL mode for concurrent readers during repopulation.
        sqlx::query("PRAGMA journal_mode=WAL").execute(&pool).await?;
        sqlx::query("PRAGMA synchronous=NORMAL").execute(&pool).await?;
        sqlx::query("PRAGMA foreign_keys=ON").execute(&pool).await?;

        Self::init_schema(&pool).await?;
        Ok(pool)
    }

    /// Create the four tables if they do not exist.
    async fn init_schema(pool: &SqlitePool) -> EngineResult<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS variables (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            )",
        )
        .execute(pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS middlewares (
                key TEXT PRIMARY KEY,
                script TEXT NOT NULL,
                ord INTEGER NOT NULL
            )",
        )
        .execute(pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS routes (
                endpoint TEXT PRIMARY KEY,
                middlewares TEXT NOT NULL,
                view TEXT NOT NULL
            )",
        )
        .execute(pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS components (
                key TEXT PRIMARY KEY,
                view TEXT NOT NULL
            )",
        )
        .execute(pool)
        .await?;

        Ok(())
    }

    /// Wait for the lazily-opened pool.
    ///
    /// Retries on a fixed backoff rather than failing while the first
    /// connection is still in flight.
    pub(crate) async fn pool(&self) -> SqlitePool {
        loop {
            if let Some(pool) = self.pool.read().await.as_ref() {
                return pool.clone();
            }
            tokio::time::sleep(CONNECT_BACKOFF).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn temp_cache() -> (SyncCache, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let cache = SyncCache::open(dir.path().join("cache.db")).await.unwrap();
        (cache, dir)
    }

    #[tokio::test]
    async fn test_cache_creation() {
        let (_cache, _dir) = temp_cache().await;
    }

    #[tokio::test]
    async fn test_lazy_open_serves_waiting_readers() {
        let dir = tempfile::tempdir().unwrap();
        let cache = SyncCache::new_lazy_at(dir.path().join("cache.db"));
        // Issued before the background connect finishes; must wait, not fail.
        let value = cache.get_variable("missing").await.unwrap();
        assert!(value.is_none());
    }
}
