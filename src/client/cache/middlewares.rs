//! Middlewares table operations.

use serde::{Deserialize, Serialize};
use sqlx::Row;

use crate::client::cache::SyncCache;
use crate::shared::error::EngineResult;

/// A middleware as stored client-side: script body is cipher text
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedMiddleware {
    /// Unique middleware key
    pub key: String,
    /// Cipher text of the script body
    pub script: String,
    /// Execution order among a route's middlewares
    pub order: i64,
}

impl SyncCache {
    /// Insert a middleware; replaces on key conflict.
    pub async fn add_middleware(&self, middleware: &CachedMiddleware) -> EngineResult<()> {
        let pool = self.pool().await;
        sqlx::query(
            "INSERT INTO middlewares (key, script, ord) VALUES (?, ?, ?)
             ON CONFLICT (key) DO UPDATE SET script = excluded.script, ord = excluded.ord",
        )
        .bind(&middleware.key)
        .bind(&middleware.script)
        .bind(middleware.order)
        .execute(&pool)
        .await?;
        Ok(())
    }

    /// Read one middleware by key.
    pub async fn get_middleware(&self, key: &str) -> EngineResult<Option<CachedMiddleware>> {
        let pool = self.pool().await;
        let row = sqlx::query("SELECT key, script, ord FROM middlewares WHERE key = ?")
            .bind(key)
            .fetch_optional(&pool)
            .await?;
        Ok(row.map(|row| CachedMiddleware {
            key: row.get("key"),
            script: row.get("script"),
            order: row.get("ord"),
        }))
    }

    /// Read all middlewares in execution order.
    pub async fn get_middlewares(&self) -> EngineResult<Vec<CachedMiddleware>> {
        let pool = self.pool().await;
        let rows = sqlx::query("SELECT key, script, ord FROM middlewares ORDER BY ord ASC")
            .fetch_all(&pool)
            .await?;
        Ok(rows
            .into_iter()
            .map(|row| CachedMiddleware {
                key: row.get("key"),
                script: row.get("script"),
                order: row.get("ord"),
            })
            .collect())
    }

    /// Delete one middleware.
    pub async fn delete_middleware(&self, key: &str) -> EngineResult<()> {
        let pool = self.pool().await;
        sqlx::query("DELETE FROM middlewares WHERE key = ?")
            .bind(key)
            .execute(&pool)
            .await?;
        Ok(())
    }

    /// Clear the middlewares table.
    pub async fn clear_middlewares(&self) -> EngineResult<()> {
        let pool = self.pool().await;
        sqlx::query("DELETE FROM middlewares").execute(&pool).await?;
        Ok(())
    }
}
