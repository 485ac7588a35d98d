//! Caching module for honey
//!
//! Backend results are kept in a local SQLite database so repeated lookups
//! within the TTL skip the provider round trip. The cache is an optimization
//! only: it can be deleted at any time.

mod store;

pub use store::{CacheError, CacheStore};
