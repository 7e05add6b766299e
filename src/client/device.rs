//! # Device Identity
//!
//! The client identifies itself with a device identifier minted once and
//! persisted in the variables table of the local sync cache. The
//! identifier feeds the cipher secret derivation and travels on every
//! backend request.

use uuid::Uuid;

use crate::client::cache::SyncCache;
use crate::shared::error::EngineResult;

/// Variables-table key under which the identifier persists.
pub const DEVICE_ID_KEY: &str = "device_id";

/// Load the persisted device identifier, minting one on first boot.
pub async fn provision_device_id(cache: &SyncCache) -> EngineResult<String> {
    if let Some(existing) = cache.get_variable(DEVICE_ID_KEY).await? {
        return Ok(existing);
    }
    let device_id = Uuid::new_v4().to_string();
    cache.set_variable(DEVICE_ID_KEY, &device_id).await?;
    tracing::info!(device_id = %device_id, "minted new device identifier");
    Ok(device_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_device_id_is_stable_across_boots() {
        let dir = tempfile::tempdir().unwrap();
        let cache = SyncCache::open(dir.path().join("cache.db")).await.unwrap();

        let first = provision_device_id(&cache).await.unwrap();
        let second = provision_device_id(&cache).await.unwrap();
        assert_eq!(first, second);
        assert!(Uuid::parse_str(&first).is_ok());
    }
}
