// crates/server/src/routes/pipeline.rs
//! Pipeline control routes.
//!
//! - POST /pipeline/start             - Validate, admit, debit, launch a job
//! - GET  /pipeline/{job_id}/status   - Full job record
//! - POST /pipeline/{job_id}/cancel   - Request cooperative cancellation

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::routing::{get, post};
use axum::{Json, Router};
use base64::Engine as _;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use ts_rs::TS;
use uuid::Uuid;

use worldsmith_core::{Admission, ImageSource, JobRequest, LedgerError};
use worldsmith_types::{Job, Owner, Quality};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

// ============================================================================
// Request / Response Types
// ============================================================================

/// Request body for POST /api/pipeline/start.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartPipelineRequest {
    /// Free-text concept of the world to generate.
    pub concept: Option<String>,
    #[serde(default)]
    pub quality: Quality,
    /// Optional caller-supplied source image.
    #[serde(default)]
    pub image: Option<ImagePayload>,
}

/// Source image carrier: either hosted or inline base64 bytes.
#[derive(Debug, Deserialize)]
#[serde(untagged, rename_all = "camelCase")]
pub enum ImagePayload {
    Hosted {
        url: String,
    },
    Inline {
        data: String,
        #[serde(default = "default_image_mime")]
        mime: String,
    },
}

fn default_image_mime() -> String {
    "image/png".to_string()
}

impl ImagePayload {
    fn into_source(self) -> Result<ImageSource, ApiError> {
        match self {
            Self::Hosted { url } => Ok(ImageSource::Url(url)),
            Self::Inline { data, mime } => {
                let bytes = base64::engine::general_purpose::STANDARD
                    .decode(data.as_bytes())
                    .map_err(|e| ApiError::BadRequest(format!("invalid image encoding: {e}")))?;
                Ok(ImageSource::Bytes {
                    data: Bytes::from(bytes),
                    mime,
                })
            }
        }
    }
}

/// Response for POST /api/pipeline/start.
#[derive(Debug, Serialize, TS)]
#[ts(export, export_to = "../../web/src/types/generated/")]
#[cfg_attr(test, derive(serde::Deserialize))]
#[serde(rename_all = "camelCase")]
pub struct StartPipelineResponse {
    pub job_id: String,
    pub status: String,
    /// Balance after the debit; absent for privileged owners.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(type = "number | null")]
    pub credits_remaining: Option<u64>,
}

/// Response for POST /api/pipeline/{job_id}/cancel.
#[derive(Debug, Serialize, TS)]
#[ts(export, export_to = "../../web/src/types/generated/")]
#[cfg_attr(test, derive(serde::Deserialize))]
#[serde(rename_all = "camelCase")]
pub struct CancelPipelineResponse {
    pub job_id: String,
    pub status: String,
}

// ============================================================================
// Route Handlers
// ============================================================================

/// Resolve the caller identity from gateway headers.
///
/// Token verification happens upstream; this service trusts `x-owner-id` and
/// `x-owner-privileged` as set by the gateway. Privileged internal callers
/// may omit the id and run as "anonymous".
fn resolve_owner(headers: &HeaderMap) -> Result<Owner, ApiError> {
    let privileged = headers
        .get("x-owner-privileged")
        .and_then(|v| v.to_str().ok())
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false);

    match headers.get("x-owner-id").and_then(|v| v.to_str().ok()) {
        Some(id) if !id.is_empty() => Ok(Owner {
            id: id.to_string(),
            privileged,
        }),
        None if privileged => Ok(Owner::privileged("anonymous")),
        _ => Err(ApiError::Unauthenticated),
    }
}

/// POST /api/pipeline/start - Validate, admit, debit, launch.
///
/// Returns as soon as the job is accepted; generation runs detached and all
/// later failures surface through status polls and progress events, never
/// through this response.
async fn start_pipeline(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<StartPipelineRequest>,
) -> ApiResult<Json<StartPipelineResponse>> {
    let owner = resolve_owner(&headers)?;

    let concept = body
        .concept
        .as_deref()
        .map(str::trim)
        .unwrap_or_default()
        .to_string();
    if concept.is_empty() {
        return Err(ApiError::BadRequest("concept is required".to_string()));
    }
    let image = body.image.map(ImagePayload::into_source).transpose()?;

    match state.limiter.admit(&owner) {
        Admission::Allowed => {}
        Admission::Denied { retry_after_secs } => {
            return Err(ApiError::RateLimited { retry_after_secs });
        }
    }

    // Debit before any work starts; a failed debit means no job exists.
    let cost = state.credit_costs.cost_for(body.quality);
    let (debited, credits_remaining) = if owner.privileged {
        (0, None)
    } else {
        match state.ledger.debit(&owner.id, cost).await {
            Ok(balance) => (cost, Some(balance)),
            Err(LedgerError::InsufficientCredits) => return Err(ApiError::InsufficientCredits),
            Err(e) => {
                return Err(ApiError::Internal(format!("ledger debit failed: {e}")));
            }
        }
    };

    let job = Job::new(
        Uuid::new_v4().to_string(),
        concept.clone(),
        body.quality,
        owner.id.clone(),
    );
    let job_id = state.store.create(job);
    tracing::info!(
        job_id = %job_id,
        owner = %owner.id,
        quality = %body.quality.as_str(),
        debited,
        "pipeline job accepted"
    );

    Arc::clone(&state.pipeline).launch(
        &job_id,
        JobRequest {
            concept,
            quality: body.quality,
            image,
            owner,
            debited,
        },
    );

    Ok(Json(StartPipelineResponse {
        job_id,
        status: "started".to_string(),
        credits_remaining,
    }))
}

/// GET /api/pipeline/{job_id}/status - Full job record.
async fn get_status(
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<String>,
) -> ApiResult<Json<Job>> {
    state
        .store
        .get(&job_id)
        .map(Json)
        .ok_or(ApiError::JobNotFound(job_id))
}

/// POST /api/pipeline/{job_id}/cancel - Request cancellation.
///
/// Idempotent: acks even when the job is already terminal (the flag is set
/// but nothing consults it anymore). Unknown ids are 404.
async fn cancel_pipeline(
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<String>,
) -> ApiResult<Json<CancelPipelineResponse>> {
    if !state.store.request_cancel(&job_id) {
        return Err(ApiError::JobNotFound(job_id));
    }
    tracing::info!(job_id = %job_id, "cancellation requested");
    Ok(Json(CancelPipelineResponse {
        job_id,
        status: "cancel_requested".to_string(),
    }))
}

// ============================================================================
// Router
// ============================================================================

/// Build the pipeline router.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/pipeline/start", post(start_pipeline))
        .route("/pipeline/{job_id}/status", get(get_status))
        .route("/pipeline/{job_id}/cancel", post(cancel_pipeline))
}

// ============================================================================
// Tests
// ============================================================================
