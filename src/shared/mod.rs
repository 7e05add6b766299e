//! Shared Module
//!
//! This module contains the algorithmic core shared between the client
//! engine and the backend server: the cipher layer, the wire envelope, the
//! document data model, the route resolver, the template variable
//! resolver, and the execution sandbox.
//!
//! # Overview
//!
//! Everything here is platform-agnostic. Both binaries compile these
//! modules, and both sides of the wire run the identical resolution and
//! execution pipeline over the same stored documents.

/// Layered symmetric cipher keyed by the device secret
pub mod cipher;

/// Stored document data model
pub mod document;

/// The `{_encrypt_: ...}` wire wrapper
pub mod envelope;

/// Shared fault taxonomy
pub mod error;

/// Path pattern matching
pub mod routing;

/// Sandboxed script execution
pub mod script;

/// Two-pass template variable expansion
pub mod template;

/// Re-export commonly used types for convenience
pub use document::{Component, DocumentBundle, ElementNode, Middleware, Route, ViewDocument};
pub use error::{EngineError, EngineResult};
pub use routing::{MatchedRoute, RouteTable};
pub use script::{ScriptContext, ScriptHost, SharedStore};
