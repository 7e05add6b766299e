//! Shared Error Types
//!
//! This module defines the fault taxonomy shared between the client engine
//! and the backend server. Every failure mode of the resolution/execution
//! pipeline maps onto exactly one of these kinds.
//!
//! # Error Categories
//!
//! - `Decryption` - cipher mismatch or malformed cipher text
//! - `Resolution` - template expansion failed (depth ceiling, missing component)
//! - `Match` - no route matched the requested path
//! - `Script` - a sandboxed script threw during execution
//! - `Transport` - the network was unreachable
//! - `Cache` - the local sync cache failed an operation
//! - `Serialization` - JSON encode/decode failures
//!
//! # Usage
//!
//! ```rust
//! use pagewright::shared::error::EngineError;
//!
//! let error = EngineError::resolution("component 'card' not found");
//! ```
//!
//! # Thread Safety
//!
//! All error types are `Send + Sync` and can be safely shared across thread boundaries.
use thiserror::Error;

/// Result alias used across the shared pipeline modules.
pub type EngineResult<T> = Result<T, EngineError>;

/// Fault taxonomy shared by the client engine and the backend server
#[derive(Debug, Error, Clone)]
pub enum EngineError {
    /// Cipher mismatch or malformed cipher text
    ///
    /// A payload that fails to decode must be rejected whole; callers never
    /// attempt partial use of a payload that failed this way.
    #[error("Decryption fault: {message}")]
    Decryption {
        /// Human-readable error message
        message: String,
    },

    /// Template resolution fault (recursion ceiling, missing component)
    ///
    /// Aborts the resolution pass; the caller falls back to a not-found or
    /// placeholder presentation.
    #[error("Resolution fault: {message}")]
    Resolution {
        /// Human-readable error message
        message: String,
    },

    /// No route matched the requested path
    #[error("No route matched '{path}'")]
    Match {
        /// The path that failed to match
        path: String,
    },

    /// A sandboxed script raised an error
    ///
    /// Caught at the call site and converted into a generic failure
    /// response (server) or a logged no-op (client).
    #[error("Script fault: {message}")]
    Script {
        /// Human-readable error message
        message: String,
    },

    /// Network unreachable
    ///
    /// The client treats repeated transport faults as "offline" and keeps
    /// retrying on a fixed interval; this kind is never fatal.
    #[error("Transport fault: {message}")]
    Transport {
        /// Human-readable error message
        message: String,
    },

    /// Local sync cache failure
    #[error("Cache fault: {message}")]
    Cache {
        /// Human-readable error message
        message: String,
    },

    /// JSON serialization or deserialization error
    #[error("Serialization error: {message}")]
    Serialization {
        /// Human-readable error message
        message: String,
    },
}

impl EngineError {
    /// Create a new decryption fault
    pub fn decryption(message: impl Into<String>) -> Self {
        Self::Decryption {
            message: message.into(),
        }
    }

    /// Create a new resolution fault
    pub fn resolution(message: impl Into<String>) -> Self {
        Self::Resolution {
            message: message.into(),
        }
    }

    /// Create a new match fault for the given path
    pub fn no_match(path: impl Into<String>) -> Self {
        Self::Match { path: path.into() }
    }

    /// Create a new script fault
    pub fn script(message: impl Into<String>) -> Self {
        Self::Script {
            message: message.into(),
        }
    }

    /// Create a new transport fault
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Create a new cache fault
    pub fn cache(message: impl Into<String>) -> Self {
        Self::Cache {
            message: message.into(),
        }
    }

    /// Create a new serialization error
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    /// Whether this fault counts as "offline" for the sync loop
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport { .. })
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization(format!("JSON error: {}", err))
    }
}

impl From<sqlx::Error> for EngineError {
    fn from(err: sqlx::Error) -> Self {
        Self::cache(err.to_string())
    }
}

impl From<reqwest::Error> for EngineError {
    fn from(err: reqwest::Error) -> Self {
        Self::transport(err.to_string())
    }
}
