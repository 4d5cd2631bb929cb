// crates/server/src/main.rs
//! Worldsmith server binary.
//!
//! Wires the external-service clients from environment configuration,
//! builds the app state, and serves the control surface. The pipeline
//! itself runs as detached tasks inside the process; there is no durable
//! job state across restarts.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use worldsmith_core::{
    HttpImageSynthesizer, HttpLedger, HttpSceneDirector, PipelineConfig, RateLimitConfig,
    WorldGenClient,
};
use worldsmith_server::{create_app, init_metrics, AppState};

/// Worldsmith: generate interactive 3D environments from text concepts.
#[derive(Debug, Parser)]
#[command(name = "worldsmith", version)]
struct Args {
    /// Address to bind.
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Port to listen on (WORLDSMITH_PORT overrides).
    #[arg(long, default_value_t = 8790)]
    port: u16,
}

/// Environment variable with a default.
fn env_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

fn env_u64(name: &str) -> Option<u64> {
    std::env::var(name).ok().and_then(|v| v.parse().ok())
}

fn env_flag(name: &str) -> bool {
    std::env::var(name)
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

fn pipeline_config_from_env() -> PipelineConfig {
    let mut config = PipelineConfig::default();
    if let Some(secs) = env_u64("WORLDSMITH_POLL_INTERVAL_SECS") {
        config.poll_interval = Duration::from_secs(secs);
    }
    if let Some(attempts) = env_u64("WORLDSMITH_POLL_MAX_ATTEMPTS") {
        config.poll_max_attempts = attempts as u32;
    }
    if let Ok(url) = std::env::var("WORLDSMITH_FALLBACK_IMAGE_URL") {
        config.fallback_image_url = Some(url);
    }
    config.refund_on_cancel = env_flag("WORLDSMITH_REFUND_ON_CANCEL");
    config
}

fn rate_limit_config_from_env() -> RateLimitConfig {
    let mut config = RateLimitConfig::default();
    if let Some(secs) = env_u64("WORLDSMITH_RATE_WINDOW_SECS") {
        config.window = Duration::from_secs(secs);
    }
    if let Some(max) = env_u64("WORLDSMITH_RATE_MAX_REQUESTS") {
        config.max_requests = max as usize;
    }
    config
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
    init_metrics();

    let ledger_url = env_or("WORLDSMITH_LEDGER_URL", "http://127.0.0.1:8791");
    let scene_url = env_or("WORLDSMITH_SCENE_URL", "http://127.0.0.1:8792");
    let image_url = env_or("WORLDSMITH_IMAGE_URL", "http://127.0.0.1:8793");
    let worldgen_url = env_or("WORLDSMITH_WORLDGEN_URL", "http://127.0.0.1:8794");

    let state = AppState::new(
        pipeline_config_from_env(),
        rate_limit_config_from_env(),
        Arc::new(HttpLedger::new(&ledger_url)),
        Arc::new(HttpSceneDirector::new(&scene_url)),
        Arc::new(HttpImageSynthesizer::new(&image_url)),
        Arc::new(WorldGenClient::new(&worldgen_url)),
    );

    // Hardening option: evict settled jobs after a TTL. Off unless set.
    if let Some(ttl_secs) = env_u64("WORLDSMITH_JOB_TTL_SECS") {
        state
            .store
            .spawn_ttl_sweep(Duration::from_secs(60), Duration::from_secs(ttl_secs));
        tracing::info!(ttl_secs, "job TTL sweep enabled");
    }

    let port = env_u64("WORLDSMITH_PORT")
        .map(|p| p as u16)
        .unwrap_or(args.port);
    let addr: SocketAddr = format!("{}:{}", args.host, port)
        .parse()
        .context("invalid bind address")?;

    let app = create_app(state);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    tracing::info!(
        %addr,
        ledger = %ledger_url,
        worldgen = %worldgen_url,
        "worldsmith server listening"
    );
    axum::serve(listener, app).await.context("server exited")?;
    Ok(())
}
