// crates/core/src/orchestrator.rs
//! The pipeline state machine.
//!
//! One detached task per job drives the linear stage sequence
//! `orchestrating → generating_image → creating_world → loading_result`,
//! writing merged job updates and publishing progress at every boundary.
//! A supervisor task wraps the stage driver so that stage errors and panics
//! funnel through a single settle path: mark the job `error`, refund the
//! debit, publish a terminal event. Cancellation is cooperative: the job's
//! flag is checked at stage entry and between poll iterations, never
//! preemptively.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use thiserror::Error;
use tokio::task::JoinHandle;

use worldsmith_types::{now_rfc3339, JobResult, JobStatus, Owner, ProgressEvent, Quality};

use crate::config::PipelineConfig;
use crate::image::ImageSynthesizer;
use crate::ledger::CreditLedger;
use crate::publisher::ProgressPublisher;
use crate::scene::{SceneBrief, SceneDirector};
use crate::store::{JobStore, JobUpdate};
use crate::worldgen::{extract, ImageRef, OperationStatus, WorldGenApi, WorldGenError};

/// Source image supplied by the caller.
#[derive(Debug, Clone)]
pub enum ImageSource {
    Bytes { data: Bytes, mime: String },
    Url(String),
}

/// Everything the orchestrator needs to run one job. Built by the control
/// surface after validation and debit.
#[derive(Debug, Clone)]
pub struct JobRequest {
    pub concept: String,
    pub quality: Quality,
    pub image: Option<ImageSource>,
    pub owner: Owner,
    /// Credits debited before launch; zero for privileged owners. This is
    /// the exact amount a refund returns.
    pub debited: u64,
}

/// Fatal pipeline failures. Everything here ends the job in `error`.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// No caller image, synthesis failed, and no fallback is configured.
    #[error("no image available for world generation")]
    MissingImage,

    #[error(transparent)]
    World(#[from] WorldGenError),
}

/// How a stage-driver run ended without failing.
enum PipelineEnd {
    Complete,
    Cancelled,
}

/// The image chosen by `generating_image` for the world-generation stage.
enum SelectedImage {
    /// Caller-supplied bytes, uploaded during `creating_world`.
    Upload { data: Bytes, mime: String },
    /// Already hosted somewhere the service can fetch.
    Hosted(String),
}

/// Stage-sequencing orchestrator shared by all jobs.
pub struct Pipeline {
    store: Arc<JobStore>,
    publisher: Arc<ProgressPublisher>,
    ledger: Arc<dyn CreditLedger>,
    scenes: Arc<dyn SceneDirector>,
    images: Arc<dyn ImageSynthesizer>,
    worldgen: Arc<dyn WorldGenApi>,
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(
        store: Arc<JobStore>,
        publisher: Arc<ProgressPublisher>,
        ledger: Arc<dyn CreditLedger>,
        scenes: Arc<dyn SceneDirector>,
        images: Arc<dyn ImageSynthesizer>,
        worldgen: Arc<dyn WorldGenApi>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            store,
            publisher,
            ledger,
            scenes,
            images,
            worldgen,
            config,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Launch the pipeline for a created job, detached from the caller.
    ///
    /// The returned handle is the supervisor task; awaiting it is only
    /// useful in tests. The supervisor owns the failure path so the refund
    /// logic is reachable from exactly one boundary, panics included.
    pub fn launch(self: Arc<Self>, job_id: impl Into<String>, request: JobRequest) -> JoinHandle<()> {
        let pipeline = self;
        let job_id = job_id.into();
        let owner = request.owner.clone();
        let debited = request.debited;
        metrics::counter!("pipeline_jobs_started_total").increment(1);

        tokio::spawn(async move {
            let started = Instant::now();
            let inner = tokio::spawn({
                let pipeline = Arc::clone(&pipeline);
                let job_id = job_id.clone();
                async move { pipeline.run(&job_id, request).await }
            });

            let outcome = match inner.await {
                Ok(Ok(PipelineEnd::Complete)) => "complete",
                Ok(Ok(PipelineEnd::Cancelled)) => "cancelled",
                Ok(Err(err)) => {
                    pipeline
                        .settle_failure(&job_id, &owner, debited, err.to_string())
                        .await;
                    "error"
                }
                Err(join_err) => {
                    tracing::error!(job_id = %job_id, error = %join_err, "pipeline task died");
                    pipeline
                        .settle_failure(
                            &job_id,
                            &owner,
                            debited,
                            "internal pipeline failure".to_string(),
                        )
                        .await;
                    "error"
                }
            };
            metrics::counter!("pipeline_jobs_settled_total", "outcome" => outcome).increment(1);
            metrics::histogram!("pipeline_job_duration_seconds")
                .record(started.elapsed().as_secs_f64());
        })
    }

    /// Drive the stage sequence for one job.
    async fn run(&self, job_id: &str, request: JobRequest) -> Result<PipelineEnd, PipelineError> {
        let Some(cancel) = self.store.cancel_flag(job_id) else {
            tracing::warn!(job_id, "job missing from store, nothing to run");
            return Ok(PipelineEnd::Cancelled);
        };
        let mut percent = 0u8;

        // ── orchestrating: shape the concept into a scene brief ──────────
        if cancel.load(Ordering::Relaxed) {
            return Ok(self.settle_cancel(job_id, &request, &mut percent).await);
        }
        self.store
            .merge(job_id, JobUpdate::status(JobStatus::Orchestrating));
        self.emit(job_id, JobStatus::Orchestrating, &mut percent, 0, "shaping scene concept", None);

        // Visual/educational content is not on the critical path of asset
        // delivery: an unreachable content service degrades to an empty
        // placeholder brief.
        let brief = match self.scenes.shape(&request.concept, request.quality).await {
            Ok(brief) => brief,
            Err(e) => {
                tracing::warn!(job_id, error = %e, "scene shaping failed (non-fatal), using placeholder");
                SceneBrief::default()
            }
        };
        let brief_payload =
            (!brief.is_empty()).then(|| serde_json::json!({ "sceneSummary": brief.summary }));
        self.emit(job_id, JobStatus::Orchestrating, &mut percent, 15, "scene brief ready", brief_payload);

        // ── generating_image: pick or synthesize the source image ────────
        if cancel.load(Ordering::Relaxed) {
            return Ok(self.settle_cancel(job_id, &request, &mut percent).await);
        }
        self.store
            .merge(job_id, JobUpdate::status(JobStatus::GeneratingImage));
        self.emit(job_id, JobStatus::GeneratingImage, &mut percent, 20, "selecting source image", None);

        let selected = self.select_image(job_id, &request, &brief).await?;
        let image_payload = match &selected {
            SelectedImage::Hosted(url) => Some(serde_json::json!({ "imageUrl": url })),
            SelectedImage::Upload { .. } => None,
        };
        self.emit(job_id, JobStatus::GeneratingImage, &mut percent, 40, "source image ready", image_payload);

        // ── creating_world: the full external generation protocol ────────
        if cancel.load(Ordering::Relaxed) {
            return Ok(self.settle_cancel(job_id, &request, &mut percent).await);
        }
        self.store
            .merge(job_id, JobUpdate::status(JobStatus::CreatingWorld));
        self.emit(job_id, JobStatus::CreatingWorld, &mut percent, 42, "preparing world generation", None);

        let image_ref = match selected {
            SelectedImage::Upload { data, mime } => {
                let ticket = self
                    .worldgen
                    .prepare_upload(&format!("{job_id}-source"))
                    .await?;
                self.worldgen.upload_asset(&ticket, data, &mime).await?;
                self.emit(job_id, JobStatus::CreatingWorld, &mut percent, 45, "source image uploaded", None);
                ImageRef::AssetId(ticket.asset_id)
            }
            SelectedImage::Hosted(url) => ImageRef::Url(url),
        };
        let source_image_url = match &image_ref {
            ImageRef::Url(url) => Some(url.clone()),
            ImageRef::AssetId(_) => None,
        };

        let prompt = world_prompt(&request.concept, &brief, request.quality);
        let handle = self.worldgen.submit_generation(&image_ref, &prompt).await?;
        tracing::info!(job_id, operation = %handle, quality = %request.quality.as_str(), "world generation submitted");
        self.emit(job_id, JobStatus::CreatingWorld, &mut percent, 48, "world generation submitted", None);

        let mut world_id = None;
        for attempt in 1..=self.config.poll_max_attempts {
            if cancel.load(Ordering::Relaxed) {
                return Ok(self.settle_cancel(job_id, &request, &mut percent).await);
            }
            tokio::time::sleep(self.config.poll_interval).await;

            match self.worldgen.poll_operation(&handle).await? {
                OperationStatus::Pending => {
                    let target = 50 + (attempt * 35 / self.config.poll_max_attempts) as u8;
                    self.emit(job_id, JobStatus::CreatingWorld, &mut percent, target.min(85), "generating world", None);
                }
                OperationStatus::Done {
                    error: Some(message),
                    ..
                } => return Err(WorldGenError::OperationFailed(message).into()),
                OperationStatus::Done {
                    world_id: Some(id), ..
                } => {
                    world_id = Some(id);
                    break;
                }
                OperationStatus::Done { .. } => {
                    return Err(WorldGenError::OperationFailed(
                        "operation finished without a result identifier".to_string(),
                    )
                    .into())
                }
            }
        }
        let world_id = world_id.ok_or(WorldGenError::PollTimeout {
            attempts: self.config.poll_max_attempts,
        })?;
        self.emit(job_id, JobStatus::CreatingWorld, &mut percent, 85, "world generated, resolving assets", None);

        // Asset fields can lag behind the operation's `done`; retry the
        // fetch until they appear.
        let mut doc = None;
        for attempt in 1..=self.config.result_retry_attempts {
            if cancel.load(Ordering::Relaxed) {
                return Ok(self.settle_cancel(job_id, &request, &mut percent).await);
            }
            let fetched = self.worldgen.fetch_world(&world_id).await?;
            if extract::assets_ready(&fetched, &self.config.extraction) {
                doc = Some(fetched);
                break;
            }
            tracing::debug!(job_id, attempt, "world assets not yet available");
            tokio::time::sleep(self.config.result_retry_interval).await;
        }
        let doc = doc.ok_or(WorldGenError::ResultTimeout {
            attempts: self.config.result_retry_attempts,
        })?;
        let assets = extract::extract_assets(&doc, &self.config.extraction)?;
        self.emit(job_id, JobStatus::CreatingWorld, &mut percent, 90, "world assets resolved", None);

        // ── loading_result: bookkeeping only, cannot fail ────────────────
        self.store
            .merge(job_id, JobUpdate::status(JobStatus::LoadingResult));
        self.emit(job_id, JobStatus::LoadingResult, &mut percent, 95, "assembling result", None);

        let result = JobResult {
            world_url: assets.world_url,
            collision_url: assets.collision_url,
            world_lowres_url: assets.lowres_url,
            preview_image_url: assets.preview_url.or(source_image_url),
        };
        self.store.merge(
            job_id,
            JobUpdate::status(JobStatus::Complete)
                .with_result(result.clone())
                .with_completed_at(now_rfc3339()),
        );
        let payload = serde_json::to_value(&result).ok();
        self.emit(job_id, JobStatus::Complete, &mut percent, 100, "world ready", payload);
        self.publisher.retire(job_id);
        tracing::info!(job_id, world_url = %result.world_url, "pipeline complete");
        Ok(PipelineEnd::Complete)
    }

    async fn select_image(
        &self,
        job_id: &str,
        request: &JobRequest,
        brief: &SceneBrief,
    ) -> Result<SelectedImage, PipelineError> {
        match &request.image {
            Some(ImageSource::Bytes { data, mime }) => Ok(SelectedImage::Upload {
                data: data.clone(),
                mime: mime.clone(),
            }),
            Some(ImageSource::Url(url)) => Ok(SelectedImage::Hosted(url.clone())),
            None => {
                let prompt = image_prompt(&request.concept, brief);
                match self.images.synthesize(&prompt).await {
                    Ok(url) => Ok(SelectedImage::Hosted(url)),
                    Err(e) => match &self.config.fallback_image_url {
                        Some(fallback) => {
                            tracing::warn!(job_id, error = %e, "image synthesis failed (non-fatal), using fallback image");
                            Ok(SelectedImage::Hosted(fallback.clone()))
                        }
                        None => {
                            tracing::error!(job_id, error = %e, "image synthesis failed and no fallback image is configured");
                            Err(PipelineError::MissingImage)
                        }
                    },
                }
            }
        }
    }

    /// Terminal settle for an observed cancellation.
    async fn settle_cancel(
        &self,
        job_id: &str,
        request: &JobRequest,
        percent: &mut u8,
    ) -> PipelineEnd {
        self.store.merge(
            job_id,
            JobUpdate::status(JobStatus::Cancelled).with_completed_at(now_rfc3339()),
        );
        if self.config.refund_on_cancel && request.debited > 0 {
            match self.ledger.credit(&request.owner.id, request.debited).await {
                Ok(balance) => tracing::info!(job_id, balance, "cancelled job refunded"),
                Err(e) => tracing::error!(job_id, error = %e, "refund for cancelled job failed"),
            }
        }
        self.emit(job_id, JobStatus::Cancelled, percent, 100, "generation cancelled", None);
        self.publisher.retire(job_id);
        tracing::info!(job_id, "pipeline cancelled");
        PipelineEnd::Cancelled
    }

    /// Terminal settle for a fatal failure (or panic). Best-effort refund:
    /// a failed credit call leaves the job `error` regardless.
    async fn settle_failure(&self, job_id: &str, owner: &Owner, debited: u64, message: String) {
        if let Some(job) = self.store.get(job_id) {
            if job.status.is_terminal() {
                tracing::warn!(job_id, status = %job.status, "failure after terminal state, ignoring");
                return;
            }
        }
        tracing::error!(job_id, error = %message, "pipeline failed");
        self.store.merge(
            job_id,
            JobUpdate::status(JobStatus::Error)
                .with_error(message.clone())
                .with_completed_at(now_rfc3339()),
        );

        if debited > 0 && !owner.privileged {
            match self.ledger.credit(&owner.id, debited).await {
                Ok(balance) => tracing::info!(job_id, balance, "debit refunded"),
                Err(e) => tracing::error!(job_id, error = %e, "refund failed, job remains errored"),
            }
        }

        self.publisher
            .publish(ProgressEvent::new(job_id, JobStatus::Error, 100, message));
        self.publisher.retire(job_id);
    }

    /// Publish a progress event, clamping percent so observers never see it
    /// decrease within a job.
    fn emit(
        &self,
        job_id: &str,
        stage: JobStatus,
        percent: &mut u8,
        target: u8,
        message: &str,
        payload: Option<serde_json::Value>,
    ) {
        *percent = (*percent).max(target);
        let mut event = ProgressEvent::new(job_id, stage, *percent, message);
        if let Some(payload) = payload {
            event = event.with_payload(payload);
        }
        tracing::debug!(job_id, stage = %stage, percent = *percent, "{}", message);
        self.publisher.publish(event);
    }
}

fn scene_subject<'a>(concept: &'a str, brief: &'a SceneBrief) -> &'a str {
    if brief.summary.is_empty() {
        concept
    } else {
        &brief.summary
    }
}

fn image_prompt(concept: &str, brief: &SceneBrief) -> String {
    format!(
        "Wide panoramic establishing shot of {}, photorealistic, golden-hour lighting, no people in frame",
        scene_subject(concept, brief)
    )
}

/// Quality-dependent prompt template. Higher tiers ask for larger, more
/// open exploration spaces.
fn world_prompt(concept: &str, brief: &SceneBrief, quality: Quality) -> String {
    let subject = scene_subject(concept, brief);
    match quality {
        Quality::Draft => format!("A small explorable 3D diorama of {subject}."),
        Quality::Standard => format!(
            "An explorable 3D environment of {subject} with walkable terrain and natural boundaries."
        ),
        Quality::Immersive => format!(
            "A vast, richly detailed 3D world of {subject} with expansive open areas to explore, \
             distant landmarks on the horizon, and varied elevation that invites long traversal."
        ),
    }
}
