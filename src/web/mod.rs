//! Web server module
//!
//! Provides the JSON API over the find engine.

mod handlers;
mod routes;
mod state;

pub use routes::create_router;
pub use state::{AppState, ResponseCache};
