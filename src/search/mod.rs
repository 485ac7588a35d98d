//! Find orchestration module
//!
//! Coordinates a find across multiple backends: cache lookups first, then
//! concurrent live queries for the misses, merged into one result.

mod executor;
mod models;

pub use executor::Finder;
pub use models::*;
