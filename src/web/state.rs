//! Application state shared across handlers

use crate::backends::BackendRegistry;
use crate::config::Settings;
use crate::results::FlattenData;
use crate::search::Finder;
use moka::future::Cache;
use std::sync::Arc;
use std::time::Duration;

/// Memoized flattened results for the instances endpoint
#[derive(Clone)]
pub struct ResponseCache {
    cache: Cache<String, Arc<FlattenData>>,
}

impl ResponseCache {
    pub fn new(ttl_seconds: u64, max_capacity: u64) -> Self {
        let cache = Cache::builder()
            .time_to_live(Duration::from_secs(ttl_seconds))
            .max_capacity(max_capacity)
            .build();

        Self { cache }
    }

    pub async fn get(&self, key: &str) -> Option<Arc<FlattenData>> {
        self.cache.get(key).await
    }

    pub async fn set(&self, key: String, value: Arc<FlattenData>) {
        self.cache.insert(key, value).await;
    }
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Find engine, also owning the registry and settings
    pub finder: Arc<Finder>,
    /// Instances endpoint memo
    pub responses: ResponseCache,
}

impl AppState {
    pub fn new(finder: Finder) -> Self {
        let server = &finder.settings().server;
        let responses = ResponseCache::new(server.response_cache_ttl, server.response_cache_capacity);

        Self {
            finder: Arc::new(finder),
            responses,
        }
    }

    pub fn settings(&self) -> &Settings {
        self.finder.settings()
    }

    pub fn registry(&self) -> &BackendRegistry {
        self.finder.registry()
    }
}
