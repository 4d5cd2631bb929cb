// crates/types/src/lib.rs
//! Shared domain and wire types for the worldsmith pipeline.
//!
//! Everything here crosses the API boundary (serde camelCase, TS exports for
//! the web viewer) or is shared between the core pipeline and the server.

pub mod job;
pub mod owner;
pub mod progress;

pub use job::{Job, JobResult, JobStatus, Quality};
pub use owner::Owner;
pub use progress::ProgressEvent;

/// RFC 3339 timestamp for "now", the single time format used on the wire.
pub fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339()
}
