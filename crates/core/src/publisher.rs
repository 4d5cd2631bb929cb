// crates/core/src/publisher.rs
//! Per-job progress pub/sub.

use std::collections::HashMap;
use std::sync::RwLock;

use tokio::sync::broadcast;

use worldsmith_types::ProgressEvent;

/// Capacity of each per-job broadcast channel. A slow subscriber that lags
/// past this many events loses the oldest ones (delivery is best-effort).
const CHANNEL_CAPACITY: usize = 64;

/// Pub/sub hub keyed by job id.
///
/// Delivery is best-effort and only reaches observers subscribed at publish
/// time; there is no replay. Late subscribers recover current state via a
/// status poll of the job store. Unsubscribing is dropping the receiver.
#[derive(Default)]
pub struct ProgressPublisher {
    channels: RwLock<HashMap<String, broadcast::Sender<ProgressEvent>>>,
}

impl ProgressPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to a job's progress events, creating the channel on demand.
    pub fn subscribe(&self, job_id: &str) -> broadcast::Receiver<ProgressEvent> {
        match self.channels.write() {
            Ok(mut channels) => channels
                .entry(job_id.to_string())
                .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
                .subscribe(),
            Err(e) => {
                tracing::error!("publisher lock poisoned on subscribe: {e}");
                // Orphan receiver: sees no events, observes close immediately.
                broadcast::channel(1).1
            }
        }
    }

    /// Publish an event to the job's current subscribers. Send errors (no
    /// subscribers) are ignored.
    pub fn publish(&self, event: ProgressEvent) {
        match self.channels.read() {
            Ok(channels) => {
                if let Some(tx) = channels.get(&event.job_id) {
                    let _ = tx.send(event);
                }
            }
            Err(e) => tracing::error!("publisher lock poisoned on publish: {e}"),
        }
    }

    /// Drop a job's channel after its terminal event, so draining receivers
    /// observe channel close and streams end.
    pub fn retire(&self, job_id: &str) {
        match self.channels.write() {
            Ok(mut channels) => {
                channels.remove(job_id);
            }
            Err(e) => tracing::error!("publisher lock poisoned on retire: {e}"),
        }
    }

    /// Current subscriber count for a job (test hook).
    pub fn subscriber_count(&self, job_id: &str) -> usize {
        match self.channels.read() {
            Ok(channels) => channels.get(job_id).map(|tx| tx.receiver_count()).unwrap_or(0),
            Err(_) => 0,
        }
    }
}
