//! Find execution across multiple backends

use super::models::{FindError, FindRequest};
use crate::backends::{Backend, BackendRegistry};
use crate::cache::CacheStore;
use crate::config::{BackendTarget, ConfigResolver, Settings};
use crate::network::HttpClient;
use crate::results::{Printable, ResultContainer};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// A backend that missed the cache and needs a live query
struct LiveQuery {
    identifier: String,
    cache_key: String,
    backend: Arc<dyn Backend>,
}

/// Coordinates a find across backends, the cache and live queries
pub struct Finder {
    registry: Arc<BackendRegistry>,
    resolver: ConfigResolver,
    client: HttpClient,
    cache: Option<Arc<CacheStore>>,
    cache_ttl: Duration,
}

impl Finder {
    /// Create a finder without a cache
    pub fn new(registry: Arc<BackendRegistry>, resolver: ConfigResolver, client: HttpClient) -> Self {
        let cache_ttl = Duration::from_secs(resolver.settings().cache.ttl);
        Self {
            registry,
            resolver,
            client,
            cache: None,
            cache_ttl,
        }
    }

    /// Attach a result cache
    pub fn with_cache(mut self, cache: Arc<CacheStore>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Override the cache entry lifetime
    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    pub fn registry(&self) -> &BackendRegistry {
        &self.registry
    }

    pub fn settings(&self) -> &Settings {
        self.resolver.settings()
    }

    /// Find instances matching the request's pattern on every requested backend
    pub async fn find(&self, request: &FindRequest) -> Result<Printable, FindError> {
        self.find_with_cancel(request, CancellationToken::new()).await
    }

    /// Like [`Finder::find`], aborting when `cancel` fires.
    ///
    /// Either every backend answers (from cache or live) or the call fails;
    /// partial results are never returned.
    pub async fn find_with_cancel(
        &self,
        request: &FindRequest,
        cancel: CancellationToken,
    ) -> Result<Printable, FindError> {
        let identifiers = request.distinct_backends();
        if identifiers.is_empty() {
            return Err(FindError::NoBackends);
        }

        let container = ResultContainer::new();
        let read_cache = !request.no_cache && !self.settings().cache.disabled;
        let mut pending = Vec::new();
        // (backend type, settings section) already taken by an earlier identifier
        let mut seen = HashSet::new();

        for identifier in &identifiers {
            let target = self.resolver.target(&self.registry, identifier)?;
            if !seen.insert((target.descriptor.name.clone(), target.section.clone())) {
                debug!(
                    "Skipping {}: resolves to backend {} from section {} already requested",
                    identifier, target.descriptor.name, target.section
                );
                continue;
            }

            let backend = self.instantiate(identifier, &target)?;
            let cache_key = backend.cache_key_name(&request.pattern);

            if read_cache {
                if let Some(hit) = self.cached(identifier, &cache_key).await {
                    container.add(hit);
                    continue;
                }
            }

            pending.push(LiveQuery {
                identifier: identifier.to_string(),
                cache_key,
                backend,
            });
        }

        info!(
            "Finding '{}' on {} backends ({} from cache)",
            request.pattern,
            seen.len(),
            seen.len() - pending.len()
        );

        if !pending.is_empty() {
            self.query_live(pending, &request.pattern, &container, cancel)
                .await?;
        }

        info!("Found {} instances for '{}'", container.len(), request.pattern);
        Ok(container.take())
    }

    /// Build the backend an identifier resolved to
    fn instantiate(&self, identifier: &str, target: &BackendTarget) -> Result<Arc<dyn Backend>, FindError> {
        let config = self.resolver.resolve(&target.descriptor, &target.section)?;

        debug!(
            "Instantiating backend {} ({}) from section {}",
            identifier, target.descriptor.name, target.section
        );

        let backend = target
            .descriptor
            .instantiate(&config, &self.client)
            .map_err(|error| FindError::Init {
                backend: identifier.to_string(),
                error,
            })?;

        Ok(Arc::from(backend))
    }

    /// Cached result, or `None` on any cache error
    async fn cached(&self, bucket: &str, key: &str) -> Option<Printable> {
        let cache = self.cache.as_ref()?;
        match cache.get::<Printable>(bucket, key).await {
            Ok(hit) => {
                debug!("Using cache for {} ({}): {} instances", bucket, key, hit.len());
                Some(hit)
            }
            Err(e) => {
                debug!("Cache lookup for {} ({}) failed: {}", bucket, key, e);
                None
            }
        }
    }

    /// Query every pending backend concurrently; the first failure cancels the rest
    async fn query_live(
        &self,
        pending: Vec<LiveQuery>,
        pattern: &str,
        container: &ResultContainer,
        parent: CancellationToken,
    ) -> Result<(), FindError> {
        let cancel = parent.child_token();
        let mut tasks = JoinSet::new();

        for query in pending {
            let cancel = cancel.clone();
            let pattern = pattern.to_string();
            let container = container.clone();
            let cache = self.cache.clone();
            let ttl = self.cache_ttl;

            tasks.spawn(async move {
                let start = Instant::now();

                // adapter panics come back as a JoinError on this handle
                let backend = query.backend.clone();
                let token = cancel.clone();
                let listing = tokio::spawn(async move {
                    tokio::select! {
                        biased;
                        _ = token.cancelled() => Err(anyhow::anyhow!("query cancelled")),
                        result = backend.list(&pattern, &token) => result,
                    }
                });
                let result = match listing.await {
                    Ok(result) => result,
                    Err(e) => Err(anyhow::anyhow!("query task failed: {}", e)),
                };

                let printable = result.map_err(|error| FindError::Query {
                    backend: query.identifier.clone(),
                    error,
                })?;

                debug!(
                    "Backend {} returned {} instances in {:?}",
                    query.identifier,
                    printable.len(),
                    start.elapsed()
                );

                if let Some(cache) = cache {
                    if let Err(e) = cache.put(&query.identifier, &query.cache_key, &printable, ttl).await {
                        warn!("Can't store cache for backend {}: {}", query.identifier, e);
                    }
                }

                container.add(printable);
                Ok::<(), FindError>(())
            });
        }

        while let Some(joined) = tasks.join_next().await {
            let outcome = joined.map_err(FindError::from).and_then(|result| result);
            if let Err(e) = outcome {
                cancel.cancel();
                tasks.abort_all();

                if parent.is_cancelled() {
                    return Err(FindError::Cancelled);
                }
                warn!("Find failed: {}", e);
                return Err(e);
            }
        }

        Ok(())
    }
}
