// crates/server/src/state.rs
//! Application state for the Axum server.

use std::sync::Arc;
use std::time::Instant;

use worldsmith_core::{
    CreditCosts, CreditLedger, ImageSynthesizer, JobStore, Pipeline, PipelineConfig,
    ProgressPublisher, RateLimitConfig, RateLimiter, SceneDirector, WorldGenApi,
};

/// Shared application state accessible from all route handlers.
///
/// Everything mutable lives behind its own handle so tests can instantiate
/// fully isolated states; nothing here is a process-wide singleton.
pub struct AppState {
    /// Server start time for uptime tracking.
    pub start_time: Instant,
    /// Job table shared with the orchestrator.
    pub store: Arc<JobStore>,
    /// Progress pub/sub shared with the orchestrator.
    pub publisher: Arc<ProgressPublisher>,
    /// Sliding-window admission control.
    pub limiter: Arc<RateLimiter>,
    /// Credit ledger used for the synchronous pre-launch debit.
    pub ledger: Arc<dyn CreditLedger>,
    /// The stage orchestrator; jobs are launched onto it detached.
    pub pipeline: Arc<Pipeline>,
    /// Per-quality debit amounts.
    pub credit_costs: CreditCosts,
}

impl AppState {
    /// Wire up the state graph from injected external-service clients.
    pub fn new(
        pipeline_config: PipelineConfig,
        limit_config: RateLimitConfig,
        ledger: Arc<dyn CreditLedger>,
        scenes: Arc<dyn SceneDirector>,
        images: Arc<dyn ImageSynthesizer>,
        worldgen: Arc<dyn WorldGenApi>,
    ) -> Arc<Self> {
        let store = Arc::new(JobStore::new());
        let publisher = Arc::new(ProgressPublisher::new());
        let limiter = Arc::new(RateLimiter::new(limit_config));
        let credit_costs = pipeline_config.credit_costs.clone();
        let pipeline = Arc::new(Pipeline::new(
            Arc::clone(&store),
            Arc::clone(&publisher),
            Arc::clone(&ledger),
            scenes,
            images,
            worldgen,
            pipeline_config,
        ));
        Arc::new(Self {
            start_time: Instant::now(),
            store,
            publisher,
            limiter,
            ledger,
            pipeline,
            credit_costs,
        })
    }

    /// Get the server uptime in seconds.
    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}
