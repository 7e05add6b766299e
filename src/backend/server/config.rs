/**
 * Server Configuration
 *
 * This module handles loading and validation of server configuration,
 * focusing on the optional PostgreSQL document store connection.
 *
 * # Configuration Sources
 *
 * Configuration is loaded from environment variables, with sensible defaults
 * for local development when possible.
 *
 * # Error Handling
 *
 * Configuration errors are logged but do not prevent server startup.
 * When the document store database is unavailable the server falls back
 * to the seed-file document bundle.
 */

use sqlx::PgPool;

/// Database configuration result
///
/// Contains the document store connection pool if successfully configured,
/// or `None` if the database is not available.
pub type DatabaseConfig = Option<PgPool>;

/// Runtime settings read from the environment
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// TCP port the server binds
    pub port: u16,
    /// Path of the JSON seed bundle used when no database is configured
    pub seed_path: String,
}

impl ServerConfig {
    /// Load settings from environment variables.
    ///
    /// `SERVER_PORT` defaults to 1234 and `PAGEWRIGHT_SEED` to
    /// `documents.json`; malformed values fall back to the defaults.
    pub fn from_env() -> Self {
        let port = std::env::var("SERVER_PORT")
            .ok()
            .and_then(|value| value.parse::<u16>().ok())
            .unwrap_or(1234);
        let seed_path =
            std::env::var("PAGEWRIGHT_SEED").unwrap_or_else(|_| "documents.json".to_string());
        Self { port, seed_path }
    }
}

/// Load and initialize the document store connection pool
///
/// This function:
/// 1. Reads `DATABASE_URL` from environment
/// 2. Creates a PostgreSQL connection pool
///
/// # Returns
///
/// - `Some(PgPool)` if the database is successfully configured
/// - `None` if `DATABASE_URL` is not set or connection fails
///
/// # Errors
///
/// Errors are logged but do not prevent server startup. The function
/// returns `None` on any error, allowing the server to run from the
/// seed-file bundle instead.
pub async fn load_database() -> DatabaseConfig {
    let database_url = match std::env::var("DATABASE_URL") {
        Ok(url) => url,
        Err(_) => {
            tracing::warn!("DATABASE_URL not set. Serving documents from the seed file.");
            return None;
        }
    };

    tracing::info!("Connecting to document store...");

    let pool = match PgPool::connect(&database_url).await {
        Ok(pool) => pool,
        Err(e) => {
            tracing::error!("Failed to create database connection pool: {:?}", e);
            tracing::warn!("Serving documents from the seed file.");
            return None;
        }
    };

    tracing::info!("Document store connection pool created successfully");
    Some(pool)
}
