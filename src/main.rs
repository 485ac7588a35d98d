//! honey-rs server entry point

use anyhow::Result;
use honey_rs::{
    backends::BackendRegistry,
    cache::CacheStore,
    config::{self, ConfigResolver},
    network::HttpClient,
    search::Finder,
    web::{create_router, AppState},
};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> Result<()> {
    let settings = config::load()?;

    // Initialize logging
    let default_level = if settings.general.debug { "debug" } else { "info" };
    FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with_target(false)
        .init();

    info!("Starting honey-rs v{}", honey_rs::VERSION);

    let client = HttpClient::with_settings(&settings.outgoing)?;
    let registry = Arc::new(BackendRegistry::with_builtin()?);
    info!("Registered {} backends: {}", registry.len(), registry.names().join(", "));

    let settings = Arc::new(settings);
    let mut finder = Finder::new(registry, ConfigResolver::new(settings.clone()), client);

    let cache = match &settings.cache.path {
        Some(path) => CacheStore::open(path).await,
        None => CacheStore::open_default().await,
    };
    let cache = match cache {
        Ok(cache) => {
            match cache.purge_expired().await {
                Ok(purged) if purged > 0 => info!("Purged {} expired cache entries", purged),
                Ok(_) => {}
                Err(e) => warn!("Failed to purge expired cache entries: {}", e),
            }
            let cache = Arc::new(cache);
            finder = finder.with_cache(cache.clone());
            Some(cache)
        }
        Err(e) => {
            warn!("Cache unavailable, running without it: {}", e);
            None
        }
    };

    let app = create_router(AppState::new(finder));

    let addr = SocketAddr::new(settings.server.bind_address.parse()?, settings.server.port);
    info!("Starting server on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(cache) = cache {
        cache.close().await;
        info!("Cache closed");
    }

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}
