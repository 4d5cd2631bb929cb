// crates/core/src/worldgen/types.rs
//! Wire types for the world-generation protocol.

use std::collections::HashMap;

use serde::Deserialize;

/// Signed upload target returned by the prepare-upload step.
#[derive(Debug, Clone, Deserialize)]
pub struct UploadTicket {
    pub asset_id: String,
    pub upload_url: String,
    /// Transport headers the upload request must carry.
    #[serde(default)]
    pub headers: HashMap<String, String>,
}

/// Opaque handle to an asynchronous generation operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationHandle(pub String);

impl std::fmt::Display for OperationHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Source image reference accepted by the submit step.
#[derive(Debug, Clone)]
pub enum ImageRef {
    /// Asset previously uploaded through the prepare/upload steps.
    AssetId(String),
    /// Externally hosted image.
    Url(String),
}

/// Outcome of a single operation poll.
#[derive(Debug, Clone)]
pub enum OperationStatus {
    /// Still queued or running.
    Pending,
    /// The operation finished. `error` set means it failed; otherwise
    /// `world_id` identifies the result resource.
    Done {
        error: Option<String>,
        world_id: Option<String>,
    },
}

#[derive(Debug, Deserialize)]
pub(super) struct SubmitResponse {
    pub operation_id: String,
}

#[derive(Debug, Deserialize)]
pub(super) struct OperationResponse {
    pub status: String,
    #[serde(default)]
    pub error: Option<OperationError>,
    #[serde(default)]
    pub result: Option<OperationResult>,
}

#[derive(Debug, Deserialize)]
pub(super) struct OperationError {
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub(super) struct OperationResult {
    pub world_id: String,
}
