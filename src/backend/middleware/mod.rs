//! Middleware Module
//!
//! Request processing middleware for the backend server.

/// Device identifier requirement and per-request identity
pub mod device;

pub use device::{Device, DeviceIdentity};
