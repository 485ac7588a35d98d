//! Backend module
//!
//! Defines the Backend trait and provides a registry for all backend types.

mod registry;
mod traits;

// Backend implementations
pub mod consul;
pub mod rest;

pub use registry::{BackendRegistry, RegistryError};
pub use traits::*;
