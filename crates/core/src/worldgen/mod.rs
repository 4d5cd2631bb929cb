// crates/core/src/worldgen/mod.rs
//! Protocol wrapper for the external world-generation service.
//!
//! The protocol, in order (each step fails the surrounding pipeline stage on
//! non-success):
//! 1. prepare a signed upload target for a source image
//! 2. upload the raw bytes to that target
//! 3. submit a generation request (uploaded asset id or hosted URL + prompt)
//! 4. poll the returned operation handle until done
//! 5. fetch the result resource, whose asset fields may lag behind `done`
//!
//! Field extraction over the fetched resource lives in [`extract`]: an
//! ordered list of JSON-pointer candidates per logical asset, because the
//! upstream schema exposes the same asset at several possible paths.

pub mod client;
pub mod extract;
pub mod types;

pub use client::{WorldGenApi, WorldGenClient};
pub use extract::{ExtractionCandidates, WorldAssets};
pub use types::{ImageRef, OperationHandle, OperationStatus, UploadTicket};

use thiserror::Error;

/// Errors from the world-generation protocol.
#[derive(Debug, Error)]
pub enum WorldGenError {
    #[error("world generation request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("world generation service returned {status}: {body}")]
    Api { status: u16, body: String },

    /// The operation completed with an error reported by the service.
    #[error("world generation failed: {0}")]
    OperationFailed(String),

    /// The operation never reported `done` within the bounded poll budget.
    #[error("world generation timed out after {attempts} polls")]
    PollTimeout { attempts: u32 },

    /// The result resource never exposed its assets within the bounded
    /// eventual-consistency retry budget.
    #[error("world assets were not available after {attempts} fetches (timeout)")]
    ResultTimeout { attempts: u32 },

    /// The result resource is ready but none of the known asset paths hold a
    /// usable value. Distinct from a timeout: retrying will not help.
    #[error("world result produced no usable asset")]
    NoUsableAsset,
}
