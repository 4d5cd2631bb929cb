// crates/types/src/progress.rs
//! Transient progress events broadcast while a job runs.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::job::JobStatus;

/// One progress update for a job, delivered over SSE.
///
/// Events are best-effort and transient: only observers subscribed at
/// publish time see them, and a late subscriber recovers current state via a
/// status poll, not by replay. Within one job, `percent` is non-decreasing.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../web/src/types/generated/")]
#[serde(rename_all = "camelCase")]
pub struct ProgressEvent {
    pub job_id: String,
    pub stage: JobStatus,
    /// 0–100.
    #[serde(rename = "progress")]
    pub percent: u8,
    pub message: String,
    pub timestamp: String,
    /// Stage-specific extras, e.g. an intermediate preview image URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(type = "Record<string, unknown> | null")]
    pub payload: Option<serde_json::Value>,
}

impl ProgressEvent {
    pub fn new(
        job_id: impl Into<String>,
        stage: JobStatus,
        percent: u8,
        message: impl Into<String>,
    ) -> Self {
        Self {
            job_id: job_id.into(),
            stage,
            percent,
            message: message.into(),
            timestamp: crate::now_rfc3339(),
            payload: None,
        }
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = Some(payload);
        self
    }
}
