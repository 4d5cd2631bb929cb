// crates/server/src/routes/mod.rs
//! API route handlers for the worldsmith server.

pub mod events;
pub mod health;
pub mod metrics;
pub mod pipeline;

use std::sync::Arc;

use axum::Router;

use crate::state::AppState;

/// Create the combined API router with all routes under /api prefix.
///
/// Routes:
/// - GET  /api/health                     - Health check
/// - POST /api/pipeline/start             - Start a generation job
/// - GET  /api/pipeline/{job_id}/status   - Full job record
/// - POST /api/pipeline/{job_id}/cancel   - Request cancellation
/// - GET  /api/pipeline/{job_id}/events   - SSE stream of progress events
/// - GET  /metrics                        - Prometheus metrics (no prefix)
pub fn api_routes(state: Arc<AppState>) -> Router {
    Router::new()
        .nest("/api", health::router())
        .nest("/api", pipeline::router())
        .nest("/api", events::router())
        .merge(metrics::router())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::test_state;

    #[tokio::test]
    async fn test_api_routes_creation() {
        let _router = api_routes(test_state());
    }
}
