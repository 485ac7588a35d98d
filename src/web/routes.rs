//! Route definitions

use super::handlers;
use super::state::AppState;
use axum::{http::HeaderName, routing::get, Router};
use tower_http::cors::{Any, CorsLayer};

/// Create the application router with all routes
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
        .expose_headers([HeaderName::from_static(handlers::TOTAL_COUNT)]);

    Router::new()
        // API routes
        .route("/api/search", get(handlers::search))
        .route("/api/instances", get(handlers::instances))
        .route("/api/backends", get(handlers::backends))
        .route("/health", get(handlers::health))
        // Add middleware
        .layer(cors)
        // Add state
        .with_state(state)
}
