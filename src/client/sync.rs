//! # Version Sync
//!
//! The client's background handshake loop. Each tick asks the server for
//! the current document-set version; on mismatch with the cached marker
//! the full bundle is pulled and the local sync cache repopulated.
//!
//! ## Repopulation Ordering
//!
//! Repopulation is strictly ordered: middlewares, then routes, then
//! components, then the version marker. The marker write is the commit
//! point; a crash before it leaves the old version in place and the next
//! boot simply repopulates again. A concurrent reader may observe a
//! stale-but-consistent snapshot per document kind, never a torn document.
//!
//! ## Offline Behavior
//!
//! Transport faults flip the loop into an offline state that keeps
//! retrying on the same fixed interval indefinitely; recovery flips it
//! back. Nothing here is fatal.

use std::time::Duration;

use crate::client::api::ApiClient;
use crate::client::cache::{CachedComponent, CachedMiddleware, CachedRoute, SyncCache};
use crate::shared::cipher;
use crate::shared::document::DocumentBundle;
use crate::shared::error::{EngineError, EngineResult};

/// Variables-table key of the repopulation commit marker.
pub const VERSION_KEY: &str = "version";

/// Result of one handshake tick
#[derive(Debug, Clone)]
pub struct SyncOutcome {
    /// The server-reported document-set version
    pub version: String,
    /// Whether this tick repopulated the cache
    pub refreshed: bool,
}

/// Run one handshake tick: ping, compare versions, refresh on mismatch.
pub async fn check_version(api: &ApiClient, cache: &SyncCache) -> EngineResult<SyncOutcome> {
    let ping = api.get("/ping").await?;
    if !ping.success {
        return Err(EngineError::transport(format!(
            "ping answered status {}",
            ping.status
        )));
    }
    let reported = ping
        .data
        .get("version")
        .and_then(serde_json::Value::as_str)
        .unwrap_or_default()
        .to_string();

    let cached = cache.get_variable(VERSION_KEY).await?;
    if cached.as_deref() == Some(reported.as_str()) {
        return Ok(SyncOutcome {
            version: reported,
            refreshed: false,
        });
    }

    tracing::info!(
        cached = cached.as_deref().unwrap_or("<none>"),
        reported = %reported,
        "document-set version changed, pulling bundle"
    );
    let version = refresh(api, cache).await?;
    Ok(SyncOutcome {
        version,
        refreshed: true,
    })
}

/// Pull the full bundle and repopulate the cache.
pub async fn refresh(api: &ApiClient, cache: &SyncCache) -> EngineResult<String> {
    let init = api.get("/init").await?;
    if !init.success {
        return Err(EngineError::transport(format!(
            "init answered status {}",
            init.status
        )));
    }
    let bundle: DocumentBundle = serde_json::from_value(init.data)?;
    repopulate(cache, api.secret(), bundle).await
}

/// Replace the cached document set with a fresh bundle.
///
/// Scripts and views are re-encrypted under the device secret before they
/// land in the cache. The version marker is written last and acts as the
/// commit point.
pub async fn repopulate(
    cache: &SyncCache,
    secret: &str,
    bundle: DocumentBundle,
) -> EngineResult<String> {
    let version = bundle.version.clone();

    cache.clear_middlewares().await?;
    for middleware in &bundle.middlewares {
        cache
            .add_middleware(&CachedMiddleware {
                key: middleware.key.clone(),
                script: cipher::encode(secret, &middleware.script)?,
                order: middleware.order,
            })
            .await?;
    }
    tracing::debug!(count = bundle.middlewares.len(), "middlewares repopulated");

    cache.clear_routes().await?;
    for route in &bundle.routes {
        let view_text = serde_json::to_string(&route.view)?;
        cache
            .add_route(&CachedRoute {
                endpoint: route.endpoint.clone(),
                middlewares: route.middlewares.clone(),
                view: cipher::encode(secret, &view_text)?,
            })
            .await?;
    }
    tracing::debug!(count = bundle.routes.len(), "routes repopulated");

    cache.clear_components().await?;
    for component in &bundle.components {
        let view_text = serde_json::to_string(&component.view)?;
        cache
            .add_component(&CachedComponent {
                key: component.key.clone(),
                view: cipher::encode(secret, &view_text)?,
            })
            .await?;
    }
    tracing::debug!(count = bundle.components.len(), "components repopulated");

    // Commit point: everything above is retried on the old version if we
    // never get here.
    cache.set_variable(VERSION_KEY, &version).await?;
    tracing::info!(version = %version, "cache repopulated");
    Ok(version)
}

/// Keep ticking the handshake until it succeeds once.
///
/// Transport faults mean offline; they are logged and retried forever.
/// Any other fault is returned to the caller.
pub async fn initial_sync(
    api: &ApiClient,
    cache: &SyncCache,
    interval: Duration,
) -> EngineResult<SyncOutcome> {
    let mut offline_logged = false;
    loop {
        match check_version(api, cache).await {
            Ok(outcome) => return Ok(outcome),
            Err(e) if e.is_transport() => {
                if !offline_logged {
                    tracing::warn!("server unreachable, retrying: {}", e);
                    offline_logged = true;
                }
            }
            Err(e) => return Err(e),
        }
        tokio::time::sleep(interval).await;
    }
}

/// Run the handshake loop forever.
pub async fn run_sync_loop(api: ApiClient, cache: SyncCache, interval: Duration) {
    let mut online = true;
    loop {
        match check_version(&api, &cache).await {
            Ok(outcome) => {
                if !online {
                    tracing::info!("back online");
                    online = true;
                }
                if outcome.refreshed {
                    tracing::info!(version = %outcome.version, "document set refreshed");
                }
            }
            Err(e) if e.is_transport() => {
                if online {
                    tracing::warn!("offline: {}", e);
                    online = false;
                }
            }
            Err(e) => {
                tracing::error!("sync tick failed: {}", e);
            }
        }
        tokio::time::sleep(interval).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::document::{Component, Middleware, Route};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn bundle(version: &str) -> DocumentBundle {
        DocumentBundle {
            version: version.to_string(),
            middlewares: vec![Middleware {
                key: "track".into(),
                audience: Default::default(),
                script: r#"["log", "hit"]"#.into(),
                order: 1,
            }],
            routes: vec![Route {
                endpoint: "/".into(),
                method: None,
                audience: Default::default(),
                middlewares: vec!["track".into()],
                view: json!({"title": "Home", "render": {"element": "div"}}),
            }],
            components: vec![Component {
                key: "card".into(),
                view: json!({"title": "card", "render": {"element": "section"}}),
            }],
        }
    }

    #[tokio::test]
    async fn test_repopulate_commits_version_last() {
        let dir = tempfile::tempdir().unwrap();
        let cache = SyncCache::open(dir.path().join("cache.db")).await.unwrap();
        let secret = "localhost#device";

        cache.set_variable(VERSION_KEY, "1.0.0").await.unwrap();
        let version = repopulate(&cache, secret, bundle("1.0.1")).await.unwrap();

        assert_eq!(version, "1.0.1");
        assert_eq!(
            cache.get_variable(VERSION_KEY).await.unwrap().as_deref(),
            Some("1.0.1")
        );
        assert_eq!(cache.get_routes().await.unwrap().len(), 1);
        assert_eq!(cache.get_middlewares().await.unwrap().len(), 1);
        assert_eq!(cache.get_components().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_repopulated_documents_are_cipher_text() {
        let dir = tempfile::tempdir().unwrap();
        let cache = SyncCache::open(dir.path().join("cache.db")).await.unwrap();
        let secret = "localhost#device";

        repopulate(&cache, secret, bundle("1.0.1")).await.unwrap();

        let route = cache.get_route("/").await.unwrap().unwrap();
        assert!(!route.view.contains("Home"));
        let decoded = cipher::decode(secret, &route.view).unwrap();
        let view: serde_json::Value = serde_json::from_str(&decoded).unwrap();
        assert_eq!(view["title"], json!("Home"));

        let middleware = cache.get_middleware("track").await.unwrap().unwrap();
        assert_eq!(
            cipher::decode(secret, &middleware.script).unwrap(),
            r#"["log", "hit"]"#
        );
    }

    #[tokio::test]
    async fn test_repopulate_replaces_previous_set() {
        let dir = tempfile::tempdir().unwrap();
        let cache = SyncCache::open(dir.path().join("cache.db")).await.unwrap();
        let secret = "localhost#device";

        repopulate(&cache, secret, bundle("1.0.0")).await.unwrap();
        let mut next = bundle("1.0.1");
        next.routes[0].endpoint = "/welcome".into();
        repopulate(&cache, secret, next).await.unwrap();

        let routes = cache.get_routes().await.unwrap();
        assert_eq!(routes.len(), 1);
        assert_eq!(routes[0].endpoint, "/welcome");
    }
}
