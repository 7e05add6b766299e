//! Routes table operations.

use serde::{Deserialize, Serialize};
use sqlx::Row;

use crate::client::cache::SyncCache;
use crate::shared::document::{Audience, Route};
use crate::shared::error::EngineResult;

/// A route as stored client-side: view is cipher text
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedRoute {
    /// Path pattern, unique per cache
    pub endpoint: String,
    /// Middleware keys in declared order
    pub middlewares: Vec<String>,
    /// Cipher text of the serialized view document
    pub view: String,
}

impl CachedRoute {
    /// Lift the cached row back into the shared route shape.
    pub fn to_route(&self) -> Route {
        Route {
            endpoint: self.endpoint.clone(),
            method: None,
            audience: Audience::FE,
            middlewares: self.middlewares.clone(),
            view: serde_json::Value::String(self.view.clone()),
        }
    }
}

impl SyncCache {
    /// Insert a route; replaces on endpoint conflict.
    pub async fn add_route(&self, route: &CachedRoute) -> EngineResult<()> {
        let pool = self.pool().await;
        let middlewares = serde_json::to_string(&route.middlewares)?;
        sqlx::query(
            "INSERT INTO routes (endpoint, middlewares, view) VALUES (?, ?, ?)
             ON CONFLICT (endpoint) DO UPDATE SET
                middlewares = excluded.middlewares,
                view = excluded.view",
        )
        .bind(&route.endpoint)
        .bind(&middlewares)
        .bind(&route.view)
        .execute(&pool)
        .await?;
        Ok(())
    }

    /// Read one route by endpoint.
    pub async fn get_route(&self, endpoint: &str) -> EngineResult<Option<CachedRoute>> {
        let pool = self.pool().await;
        let row = sqlx::query("SELECT endpoint, middlewares, view FROM routes WHERE endpoint = ?")
            .bind(endpoint)
            .fetch_optional(&pool)
            .await?;
        row.map(Self::row_to_route).transpose()
    }

    /// Read all routes in insertion order.
    pub async fn get_routes(&self) -> EngineResult<Vec<CachedRoute>> {
        let pool = self.pool().await;
        let rows = sqlx::query("SELECT endpoint, middlewares, view FROM routes ORDER BY rowid")
            .fetch_all(&pool)
            .await?;
        rows.into_iter().map(Self::row_to_route).collect()
    }

    /// Delete one route.
    pub async fn delete_route(&self, endpoint: &str) -> EngineResult<()> {
        let pool = self.pool().await;
        sqlx::query("DELETE FROM routes WHERE endpoint = ?")
            .bind(endpoint)
            .execute(&pool)
            .await?;
        Ok(())
    }

    /// Clear the routes table.
    pub async fn clear_routes(&self) -> EngineResult<()> {
        let pool = self.pool().await;
        sqlx::query("DELETE FROM routes").execute(&pool).await?;
        Ok(())
    }

    fn row_to_route(row: sqlx::sqlite::SqliteRow) -> EngineResult<CachedRoute> {
        let middlewares: String = row.get("middlewares");
        Ok(CachedRoute {
            endpoint: row.get("endpoint"),
            middlewares: serde_json::from_str(&middlewares)?,
            view: row.get("view"),
        })
    }
}
