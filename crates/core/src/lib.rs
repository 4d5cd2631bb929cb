// crates/core/src/lib.rs
//! Worldsmith pipeline core.
//!
//! This crate owns everything between the HTTP surface and the external
//! services:
//! - `store` - in-memory job table and cooperative cancellation flags
//! - `publisher` - per-job progress broadcast channels
//! - `limiter` - sliding-window admission control per owner
//! - `ledger` - prepaid-credit debit/refund client
//! - `scene` / `image` - content-shaping and image-synthesis clients
//! - `worldgen` - the external world-generation protocol wrapper
//! - `orchestrator` - the stage state machine driving all of the above

pub mod config;
pub mod image;
pub mod ledger;
pub mod limiter;
pub mod orchestrator;
pub mod publisher;
pub mod scene;
pub mod store;
pub mod worldgen;

pub use config::{CreditCosts, PipelineConfig};
pub use image::{HttpImageSynthesizer, ImageError, ImageSynthesizer};
pub use ledger::{CreditLedger, HttpLedger, LedgerError};
pub use limiter::{Admission, RateLimitConfig, RateLimiter};
pub use orchestrator::{ImageSource, JobRequest, Pipeline, PipelineError};
pub use publisher::ProgressPublisher;
pub use scene::{HttpSceneDirector, SceneBrief, SceneDirector, SceneError};
pub use store::{JobStore, JobUpdate};
pub use worldgen::{WorldGenApi, WorldGenClient, WorldGenError};
