// crates/types/src/job.rs
//! Job record, status state machine, and quality tiers.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Pipeline stage / job status.
///
/// The pipeline is linear: `Queued → Orchestrating → GeneratingImage →
/// CreatingWorld → LoadingResult → Complete`. `Error` and `Cancelled` are
/// reachable from every non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../web/src/types/generated/")]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Orchestrating,
    GeneratingImage,
    CreatingWorld,
    LoadingResult,
    Complete,
    Error,
    Cancelled,
}

impl JobStatus {
    /// Terminal states never transition again.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Complete | Self::Error | Self::Cancelled)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Orchestrating => "orchestrating",
            Self::GeneratingImage => "generating_image",
            Self::CreatingWorld => "creating_world",
            Self::LoadingResult => "loading_result",
            Self::Complete => "complete",
            Self::Error => "error",
            Self::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Requested generation quality tier.
///
/// Higher tiers cost more credits and request larger, more open exploration
/// spaces from the world-generation service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../web/src/types/generated/")]
#[serde(rename_all = "snake_case")]
pub enum Quality {
    Draft,
    #[default]
    Standard,
    Immersive,
}

impl Quality {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Standard => "standard",
            Self::Immersive => "immersive",
        }
    }
}

/// Final asset references produced by a completed job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../web/src/types/generated/")]
#[serde(rename_all = "camelCase")]
pub struct JobResult {
    /// Primary world asset (mesh) URL.
    pub world_url: String,
    /// Collision-geometry asset, when the service produced one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collision_url: Option<String>,
    /// Low-resolution variant for progressive loading.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub world_lowres_url: Option<String>,
    /// The image the world was generated from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview_image_url: Option<String>,
}

/// One end-to-end generation job.
///
/// Created by the control surface, mutated only by its orchestrator task
/// (single writer per job); status polls read snapshot copies.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../web/src/types/generated/")]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: String,
    pub status: JobStatus,
    pub concept: String,
    pub quality: Quality,
    /// Owner id; "anonymous" only for privileged internal callers.
    pub owner: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<JobResult>,
    /// Set only when `status == Error`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<String>,
}

impl Job {
    /// New queued job with a fresh creation timestamp.
    pub fn new(
        id: impl Into<String>,
        concept: impl Into<String>,
        quality: Quality,
        owner: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            status: JobStatus::Queued,
            concept: concept.into(),
            quality,
            owner: owner.into(),
            result: None,
            error: None,
            created_at: crate::now_rfc3339(),
            completed_at: None,
        }
    }
}
