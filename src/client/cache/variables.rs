//! Variables table operations.
//!
//! Plain key/value storage carrying the version marker (the repopulation
//! commit point) and the persisted device identifier.

use sqlx::Row;

use crate::client::cache::SyncCache;
use crate::shared::error::EngineResult;

impl SyncCache {
    /// Read one variable.
    pub async fn get_variable(&self, key: &str) -> EngineResult<Option<String>> {
        let pool = self.pool().await;
        let row = sqlx::query("SELECT value FROM variables WHERE key = ?")
            .bind(key)
            .fetch_optional(&pool)
            .await?;
        Ok(row.map(|row| row.get::<String, _>("value")))
    }

    /// Write one variable, inserting or replacing.
    pub async fn set_variable(&self, key: &str, value: &str) -> EngineResult<()> {
        let pool = self.pool().await;
        sqlx::query(
            "INSERT INTO variables (key, value) VALUES (?, ?)
             ON CONFLICT (key) DO UPDATE SET value = excluded.value",
        )
        .bind(key)
        .bind(value)
        .execute(&pool)
        .await?;
        Ok(())
    }

    /// Read all variables.
    pub async fn get_variables(&self) -> EngineResult<Vec<(String, String)>> {
        let pool = self.pool().await;
        let rows = sqlx::query("SELECT key, value FROM variables ORDER BY key")
            .fetch_all(&pool)
            .await?;
        Ok(rows
            .into_iter()
            .map(|row| (row.get("key"), row.get("value")))
            .collect())
    }

    /// Delete one variable.
    pub async fn delete_variable(&self, key: &str) -> EngineResult<()> {
        let pool = self.pool().await;
        sqlx::query("DELETE FROM variables WHERE key = ?")
            .bind(key)
            .execute(&pool)
            .await?;
        Ok(())
    }

    /// Clear the variables table.
    pub async fn clear_variables(&self) -> EngineResult<()> {
        let pool = self.pool().await;
        sqlx::query("DELETE FROM variables").execute(&pool).await?;
        Ok(())
    }
}
