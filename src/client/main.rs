/**
 * Pagewright Client Entry Point
 *
 * Headless client engine: syncs the document bundle into the local cache,
 * resolves the requested path, runs lifecycle scripts, and prints the
 * resolved view for inspection. A rendering collaborator would consume the
 * same `ResolvedView` this binary prints.
 *
 * Usage: pagewright-client [path]
 */

use std::time::Duration;

use pagewright::client::config::ClientConfig;
use pagewright::client::device::provision_device_id;
use pagewright::client::engine::{Engine, Navigation};
use pagewright::client::sync::{initial_sync, run_sync_loop};
use pagewright::client::{ApiClient, SyncCache};
use pagewright::shared::script::new_store;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(&env_filter))
        .init();

    let config = ClientConfig::from_env();
    let path = std::env::args().nth(1).unwrap_or_else(|| "/".to_string());

    let cache = match &config.cache_path {
        Some(cache_path) => SyncCache::open(cache_path.clone()).await?,
        None => SyncCache::new_lazy(),
    };

    let device_id = provision_device_id(&cache).await?;
    let api = ApiClient::new(config.server_url.clone(), &config.origin, device_id);

    let interval = Duration::from_secs(config.ping_interval_secs);
    let outcome = initial_sync(&api, &cache, interval).await?;
    tracing::info!(version = %outcome.version, refreshed = outcome.refreshed, "synced");

    // Keep the handshake ticking in the background.
    tokio::spawn(run_sync_loop(api.clone(), cache.clone(), interval));

    let engine = Engine::new(cache, api, new_store());

    let mut next = Some(path);
    // Follow script-requested navigations a few hops so onLoad redirects
    // are visible from the command line.
    let mut hops = 0;
    while let Some(path) = next.take() {
        match engine.navigate(&path).await {
            Ok(Navigation::Committed(view)) => {
                println!("# {} ({})", view.title, view.path);
                if let Some(style) = &view.style {
                    println!("style: {}", style);
                }
                println!("{}", serde_json::to_string_pretty(&view.render)?);
            }
            Ok(Navigation::Superseded) => {}
            Err(e) => {
                tracing::error!("navigation failed: {}", e);
                eprintln!("cannot resolve {}: {}", path, e);
            }
        }
        hops += 1;
        if hops < 4 {
            next = engine.take_pending_navigation();
        }
    }

    Ok(())
}
