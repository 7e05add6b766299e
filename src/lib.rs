// Increase recursion limit for deeply nested async evaluation
#![recursion_limit = "256"]

//! Pagewright - Main Library
//!
//! Pagewright is a document-driven application runtime: a small set of
//! stored documents (routes, middlewares, reusable components, views)
//! drives the whole UI and the server-side API behavior without
//! redeploying code. Clients pull a versioned bundle of these documents,
//! cache them locally, match paths against route patterns, resolve view
//! trees with nested variable substitution, and run embedded scripts at
//! defined lifecycle points. The equivalent pipeline runs server-side for
//! dynamically defined API routes. Every payload crossing the wire is
//! wrapped in a layered cipher envelope keyed by a per-device identifier.
//!
//! # Module Structure
//!
//! The library is organized into three main modules:
//!
//! - **`shared`** - The algorithmic core compiled into both binaries
//!   - Layered cipher and wire envelope
//!   - Document data model
//!   - Route resolver, template variable resolver, execution sandbox
//!
//! - **`backend`** - Server-side code (only compiled with the `server` feature)
//!   - Axum HTTP server: version handshake, bundle endpoint, dynamic API routes
//!   - Document store loading (PostgreSQL or seed file)
//!   - Device-identity middleware
//!
//! - **`client`** - Client engine
//!   - Local sync cache (SQLite) and background version sync
//!   - Enveloping HTTP client and device identity
//!   - View resolution pipeline and lifecycle script execution
//!
//! # Feature Flags
//!
//! - **`server`** - enables the backend modules and their dependencies
//!   (axum, tower-http, dotenv). Required for server builds.
//!
//! # Usage
//!
//! ## Server-Side
//!
//! ```rust,ignore
//! use pagewright::backend::server::init::create_app;
//!
//! # async fn example() {
//! let app = create_app().await;
//! // Use app with Axum server
//! # }
//! ```
//!
//! ## Client Engine
//!
//! ```rust,no_run
//! use pagewright::client::{ApiClient, Engine, SyncCache};
//! use pagewright::shared::script::new_store;
//!
//! # async fn example() -> pagewright::shared::EngineResult<()> {
//! let cache = SyncCache::new_lazy();
//! let api = ApiClient::new("http://localhost:1234", "localhost", "device-id");
//! let engine = Engine::new(cache, api, new_store());
//! let navigation = engine.navigate("/users/42").await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Concurrency Model
//!
//! Both pipelines are single-process cooperative: cache reads, network
//! fetches and script execution suspend the current task without blocking
//! others, and the process-wide script store is a single shallow-merge,
//! last-write-wins container. Navigations are never cancelled mid-flight;
//! a newer resolution simply supersedes an older one at commit time.

/// Shared algorithmic core
pub mod shared;

/// Backend server-side code
#[cfg(feature = "server")]
pub mod backend;

/// Client engine
pub mod client;
