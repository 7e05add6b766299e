//! Components table operations.

use serde::{Deserialize, Serialize};
use sqlx::Row;

use crate::client::cache::SyncCache;
use crate::shared::error::EngineResult;

/// A component as stored client-side: view is cipher text
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedComponent {
    /// Unique component key
    pub key: String,
    /// Cipher text of the serialized view document
    pub view: String,
}

impl SyncCache {
    /// Insert a component; replaces on key conflict.
    pub async fn add_component(&self, component: &CachedComponent) -> EngineResult<()> {
        let pool = self.pool().await;
        sqlx::query(
            "INSERT INTO components (key, view) VALUES (?, ?)
             ON CONFLICT (key) DO UPDATE SET view = excluded.view",
        )
        .bind(&component.key)
        .bind(&component.view)
        .execute(&pool)
        .await?;
        Ok(())
    }

    /// Read one component by key.
    pub async fn get_component(&self, key: &str) -> EngineResult<Option<CachedComponent>> {
        let pool = self.pool().await;
        let row = sqlx::query("SELECT key, view FROM components WHERE key = ?")
            .bind(key)
            .fetch_optional(&pool)
            .await?;
        Ok(row.map(|row| CachedComponent {
            key: row.get("key"),
            view: row.get("view"),
        }))
    }

    /// Read all components.
    pub async fn get_components(&self) -> EngineResult<Vec<CachedComponent>> {
        let pool = self.pool().await;
        let rows = sqlx::query("SELECT key, view FROM components ORDER BY key")
            .fetch_all(&pool)
            .await?;
        Ok(rows
            .into_iter()
            .map(|row| CachedComponent {
                key: row.get("key"),
                view: row.get("view"),
            })
            .collect())
    }

    /// Delete one component.
    pub async fn delete_component(&self, key: &str) -> EngineResult<()> {
        let pool = self.pool().await;
        sqlx::query("DELETE FROM components WHERE key = ?")
            .bind(key)
            .execute(&pool)
            .await?;
        Ok(())
    }

    /// Clear the components table.
    pub async fn clear_components(&self) -> EngineResult<()> {
        let pool = self.pool().await;
        sqlx::query("DELETE FROM components").execute(&pool).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_component_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let cache = SyncCache::open(dir.path().join("cache.db")).await.unwrap();

        cache
            .add_component(&CachedComponent {
                key: "card".into(),
                view: "ciphertext".into(),
            })
            .await
            .unwrap();

        assert!(cache.get_component("card").await.unwrap().is_some());
        assert_eq!(cache.get_components().await.unwrap().len(), 1);

        cache.delete_component("card").await.unwrap();
        assert!(cache.get_component("card").await.unwrap().is_none());
    }
}
