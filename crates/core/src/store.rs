// crates/core/src/store.rs
//! In-memory job table and cooperative cancellation flags.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use worldsmith_types::{Job, JobResult, JobStatus};

/// Partial job update applied by [`JobStore::merge`].
///
/// Shallow overwrite: each `Some` field replaces the stored value, later
/// writes win. There is no optimistic-concurrency check because each job has
/// exactly one writer (its orchestrator task) by construction.
#[derive(Debug, Default, Clone)]
pub struct JobUpdate {
    pub status: Option<JobStatus>,
    pub result: Option<JobResult>,
    pub error: Option<String>,
    pub completed_at: Option<String>,
}

impl JobUpdate {
    pub fn status(status: JobStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn with_result(mut self, result: JobResult) -> Self {
        self.result = Some(result);
        self
    }

    pub fn with_error(mut self, message: impl Into<String>) -> Self {
        self.error = Some(message.into());
        self
    }

    pub fn with_completed_at(mut self, timestamp: impl Into<String>) -> Self {
        self.completed_at = Some(timestamp.into());
        self
    }
}

struct StoredJob {
    job: Job,
    cancel: Arc<AtomicBool>,
    /// When the job reached a terminal status (for the optional TTL sweep).
    settled_at: Option<Instant>,
}

/// In-memory table of job id → job state.
///
/// Jobs are created by the control surface and mutated only by their
/// orchestrator task; concurrent status polls read snapshot clones. Jobs are
/// never evicted unless a TTL sweep is spawned via [`JobStore::spawn_ttl_sweep`].
#[derive(Default)]
pub struct JobStore {
    jobs: RwLock<HashMap<String, StoredJob>>,
}

impl JobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new job, returning its id.
    pub fn create(&self, job: Job) -> String {
        let id = job.id.clone();
        match self.jobs.write() {
            Ok(mut jobs) => {
                jobs.insert(
                    id.clone(),
                    StoredJob {
                        job,
                        cancel: Arc::new(AtomicBool::new(false)),
                        settled_at: None,
                    },
                );
            }
            Err(e) => tracing::error!("job table lock poisoned on create: {e}"),
        }
        id
    }

    /// Snapshot copy of a job, or `None` if unknown.
    pub fn get(&self, id: &str) -> Option<Job> {
        match self.jobs.read() {
            Ok(jobs) => jobs.get(id).map(|entry| entry.job.clone()),
            Err(e) => {
                tracing::error!("job table lock poisoned on get: {e}");
                None
            }
        }
    }

    /// Apply a shallow partial update. Returns false for unknown ids.
    pub fn merge(&self, id: &str, update: JobUpdate) -> bool {
        match self.jobs.write() {
            Ok(mut jobs) => {
                let Some(entry) = jobs.get_mut(id) else {
                    return false;
                };
                if let Some(status) = update.status {
                    entry.job.status = status;
                    if status.is_terminal() && entry.settled_at.is_none() {
                        entry.settled_at = Some(Instant::now());
                    }
                }
                if let Some(result) = update.result {
                    entry.job.result = Some(result);
                }
                if let Some(error) = update.error {
                    entry.job.error = Some(error);
                }
                if let Some(completed_at) = update.completed_at {
                    entry.job.completed_at = Some(completed_at);
                }
                true
            }
            Err(e) => {
                tracing::error!("job table lock poisoned on merge: {e}");
                false
            }
        }
    }

    /// Set the cooperative cancellation flag. Returns false for unknown ids.
    ///
    /// Idempotent, and a no-op for jobs that already reached a terminal
    /// state (nothing consults the flag after that).
    pub fn request_cancel(&self, id: &str) -> bool {
        match self.jobs.read() {
            Ok(jobs) => match jobs.get(id) {
                Some(entry) => {
                    entry.cancel.store(true, Ordering::Relaxed);
                    true
                }
                None => false,
            },
            Err(e) => {
                tracing::error!("job table lock poisoned on cancel: {e}");
                false
            }
        }
    }

    /// Whether cancellation has been requested for `id`.
    pub fn cancel_requested(&self, id: &str) -> bool {
        self.cancel_flag(id)
            .map(|flag| flag.load(Ordering::Relaxed))
            .unwrap_or(false)
    }

    /// Shared handle to the cancellation flag, for cheap checks inside
    /// polling loops.
    pub fn cancel_flag(&self, id: &str) -> Option<Arc<AtomicBool>> {
        match self.jobs.read() {
            Ok(jobs) => jobs.get(id).map(|entry| Arc::clone(&entry.cancel)),
            Err(e) => {
                tracing::error!("job table lock poisoned on cancel_flag: {e}");
                None
            }
        }
    }

    pub fn len(&self) -> usize {
        match self.jobs.read() {
            Ok(jobs) => jobs.len(),
            Err(_) => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Evict terminal jobs that settled more than `ttl` ago. Returns the
    /// number of evicted jobs.
    pub fn evict_settled(&self, ttl: Duration) -> usize {
        match self.jobs.write() {
            Ok(mut jobs) => {
                let before = jobs.len();
                jobs.retain(|_, entry| {
                    entry
                        .settled_at
                        .map(|at| at.elapsed() < ttl)
                        .unwrap_or(true)
                });
                before - jobs.len()
            }
            Err(e) => {
                tracing::error!("job table lock poisoned on evict: {e}");
                0
            }
        }
    }

    /// Optional hardening: periodically evict terminal jobs older than
    /// `ttl`. The task exits once the store is dropped.
    pub fn spawn_ttl_sweep(
        self: &Arc<Self>,
        interval: Duration,
        ttl: Duration,
    ) -> tokio::task::JoinHandle<()> {
        let store = Arc::downgrade(self);
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;
                let Some(store) = store.upgrade() else { break };
                let evicted = store.evict_settled(ttl);
                if evicted > 0 {
                    tracing::debug!(evicted, "ttl sweep evicted settled jobs");
                }
            }
        })
    }
}
