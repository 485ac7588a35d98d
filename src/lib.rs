//! honey-rs: find instances across inventory backends
//!
//! A registry of pluggable backends, a concurrent find engine with a
//! persistent TTL cache in front of it, and a small JSON API on top.

pub mod backends;
pub mod cache;
pub mod config;
pub mod network;
pub mod results;
pub mod search;
pub mod web;

pub use backends::{Backend, BackendRegistry};
pub use cache::CacheStore;
pub use config::Settings;
pub use results::{Instance, Printable, ResultContainer};
pub use search::{FindError, FindRequest, Finder};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
