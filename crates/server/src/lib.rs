// crates/server/src/lib.rs
//! Worldsmith server library.
//!
//! This crate provides the Axum-based HTTP control surface for the
//! worldsmith generation pipeline: start/status/cancel endpoints, a per-job
//! SSE progress stream, and the metrics endpoint. All pipeline logic lives
//! in `worldsmith-core`; handlers here are thin adapters over it.

pub mod error;
pub mod metrics;
pub mod routes;
pub mod state;

#[cfg(test)]
pub(crate) mod test_support;

pub use error::*;
pub use routes::api_routes;
pub use self::metrics::{init_metrics, render_metrics};
pub use state::AppState;

use std::sync::Arc;

use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Create the Axum application with all routes and middleware.
///
/// This sets up:
/// - API routes (health, pipeline control, progress events)
/// - The Prometheus metrics endpoint
/// - CORS for the web viewer (allows any origin)
/// - Request tracing
pub fn create_app(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .merge(api_routes(state))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

// ============================================================================
// Integration Tests
// ============================================================================
