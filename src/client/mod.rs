//! Client Module
//!
//! This module contains the client-side engine: the local sync cache, the
//! background version sync loop, the enveloping HTTP client, and the view
//! resolution pipeline. Rendering of resolved element trees is delegated
//! to an external collaborator; everything up to that hand-off lives here.
//!
//! # Architecture
//!
//! - **`cache`** - local SQLite store for the document snapshot
//! - **`sync`** - version handshake loop and cache repopulation
//! - **`api`** - device-identified, enveloping HTTP client
//! - **`device`** - device identifier provisioning
//! - **`engine`** - route matching, view resolution, lifecycle scripts
//! - **`config`** - environment-driven settings

/// Enveloping HTTP client
pub mod api;

/// Local sync cache
pub mod cache;

/// Client configuration
pub mod config;

/// Device identity provisioning
pub mod device;

/// View resolution engine
pub mod engine;

/// Background version sync
pub mod sync;

/// Re-export commonly used types
pub use api::ApiClient;
pub use cache::SyncCache;
pub use engine::{Engine, Navigation, ResolvedView};
