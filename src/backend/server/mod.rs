//! Server Module
//!
//! Server initialization, configuration and application state.

/// Server configuration loading
pub mod config;

/// Server initialization
pub mod init;

/// Application state management
pub mod state;

pub use init::create_app;
pub use state::AppState;
