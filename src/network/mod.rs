//! HTTP networking module
//!
//! Provides the shared HTTP client backends use to reach provider APIs.

mod client;

pub use client::{ApiRequest, HttpClient};
