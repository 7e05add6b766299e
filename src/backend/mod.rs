//! Backend Module
//!
//! This module contains all server-side code for the pagewright application.
//! It provides an Axum HTTP server that answers the version handshake,
//! serves the frontend document bundle, and executes dynamically defined
//! API routes through the shared execution sandbox.
//!
//! # Architecture
//!
//! The backend is organized into focused submodules:
//!
//! - **`server`** - Server initialization, application state, configuration
//! - **`routes`** - HTTP route configuration and router assembly
//! - **`handlers`** - Handshake, bundle and dynamic API handlers
//! - **`documents`** - Document store loading (database or seed file)
//! - **`middleware`** - Device-identity requirement and request ids
//! - **`error`** - Backend-specific error types
//!
//! This module is only compiled when the `server` feature is enabled.
//! All code in this module runs on the server and handles HTTP requests.
//!
//! # State Management
//!
//! The backend uses shared state (`AppState`) that contains the
//! immutable-for-the-session document snapshot, the process-wide script
//! store, the optional database pool, and the environment snapshot exposed
//! to route scripts. State is shared across all request handlers using
//! `Arc`; the script store uses `tokio::sync::RwLock` for concurrent
//! access.
//!
//! # Error Handling
//!
//! The backend uses standard HTTP status codes and custom error types:
//! - `BackendError` for internal errors
//! - shared `EngineError` faults mapped onto status codes
//! - Proper error propagation with `?` operator

/// Document store loading
pub mod documents;

/// Backend error types
pub mod error;

/// Request handlers
pub mod handlers;

/// Middleware for request processing
pub mod middleware;

/// Route configuration
pub mod routes;

/// Server setup and configuration
pub mod server;

/// Re-export commonly used types
pub use error::BackendError;
pub use server::create_app;
pub use server::state::AppState;
