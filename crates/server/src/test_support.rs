// crates/server/src/test_support.rs
//! Shared helpers for in-crate route tests.

use std::sync::Arc;

use worldsmith_core::{
    HttpImageSynthesizer, HttpLedger, HttpSceneDirector, PipelineConfig, RateLimitConfig,
    WorldGenClient,
};

use crate::state::AppState;

/// A base URL nothing listens on. Tests that must not reach a service point
/// clients here; any accidental call fails fast.
const DEAD_ENDPOINT: &str = "http://127.0.0.1:9";

pub(crate) fn test_state() -> Arc<AppState> {
    test_state_with(PipelineConfig::default(), RateLimitConfig::default())
}

pub(crate) fn test_state_with(
    pipeline_config: PipelineConfig,
    limit_config: RateLimitConfig,
) -> Arc<AppState> {
    AppState::new(
        pipeline_config,
        limit_config,
        Arc::new(HttpLedger::new(DEAD_ENDPOINT)),
        Arc::new(HttpSceneDirector::new(DEAD_ENDPOINT)),
        Arc::new(HttpImageSynthesizer::new(DEAD_ENDPOINT)),
        Arc::new(WorldGenClient::new(DEAD_ENDPOINT)),
    )
}

/// State whose ledger points at a real (mock) server; everything else dead.
pub(crate) fn test_state_with_ledger(ledger_url: &str) -> Arc<AppState> {
    AppState::new(
        PipelineConfig::default(),
        RateLimitConfig::default(),
        Arc::new(HttpLedger::new(ledger_url)),
        Arc::new(HttpSceneDirector::new(DEAD_ENDPOINT)),
        Arc::new(HttpImageSynthesizer::new(DEAD_ENDPOINT)),
        Arc::new(WorldGenClient::new(DEAD_ENDPOINT)),
    )
}
