//! # Client Configuration
//!
//! Settings for the headless client engine, loaded from environment
//! variables with local-development defaults.

use std::path::PathBuf;

/// Client runtime settings
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the backend server
    pub server_url: String,
    /// Origin used for secret derivation; must agree with what the server
    /// sees in the Host header
    pub origin: String,
    /// Override for the cache file location (tests, portable installs)
    pub cache_path: Option<PathBuf>,
    /// Version handshake interval in seconds
    pub ping_interval_secs: u64,
}

impl ClientConfig {
    /// Load settings from environment variables.
    ///
    /// `PAGEWRIGHT_SERVER` defaults to `http://localhost:1234`,
    /// `PAGEWRIGHT_ORIGIN` to `localhost`, and the handshake interval to
    /// three seconds.
    pub fn from_env() -> Self {
        let server_url = std::env::var("PAGEWRIGHT_SERVER")
            .unwrap_or_else(|_| "http://localhost:1234".to_string());
        let origin = std::env::var("PAGEWRIGHT_ORIGIN").unwrap_or_else(|_| "localhost".to_string());
        let cache_path = std::env::var("PAGEWRIGHT_CACHE").ok().map(PathBuf::from);
        let ping_interval_secs = std::env::var("PAGEWRIGHT_PING_INTERVAL")
            .ok()
            .and_then(|value| value.parse::<u64>().ok())
            .unwrap_or(3);
        Self {
            server_url,
            origin,
            cache_path,
            ping_interval_secs,
        }
    }
}
