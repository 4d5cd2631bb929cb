// crates/core/src/limiter.rs
//! Sliding-window admission control per client identity.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use worldsmith_types::Owner;

/// Rate limiter configuration.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Trailing window length.
    pub window: Duration,
    /// Maximum admitted requests per key within the window.
    pub max_requests: usize,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            window: Duration::from_secs(3600),
            max_requests: 10,
        }
    }
}

/// Outcome of an admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Allowed,
    Denied { retry_after_secs: u64 },
}

/// Sliding-window rate limiter keyed by owner id.
///
/// State is in-memory only; a restart resets all counters. The limiter
/// protects cost, not security, so it fails open on a poisoned lock.
pub struct RateLimiter {
    config: RateLimitConfig,
    windows: Mutex<HashMap<String, Vec<Instant>>>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            windows: Mutex::new(HashMap::new()),
        }
    }

    /// Admit or deny a request from `owner`.
    ///
    /// Privileged owners are always admitted and never consume quota. For
    /// everyone else, timestamps older than the window are purged (for all
    /// keys, amortized across calls), then the owner's surviving count is
    /// checked against the ceiling. On denial, `retry_after_secs` is derived
    /// from the oldest timestamp still inside the window.
    pub fn admit(&self, owner: &Owner) -> Admission {
        if owner.privileged {
            return Admission::Allowed;
        }

        let now = Instant::now();
        let mut windows = match self.windows.lock() {
            Ok(guard) => guard,
            Err(e) => {
                tracing::error!("rate limiter lock poisoned, admitting: {e}");
                return Admission::Allowed;
            }
        };

        // Amortized sweep: drop expired timestamps and empty keys.
        windows.retain(|_, stamps| {
            stamps.retain(|t| now.duration_since(*t) < self.config.window);
            !stamps.is_empty()
        });

        let stamps = windows.entry(owner.key().to_string()).or_default();
        if stamps.len() < self.config.max_requests {
            stamps.push(now);
            return Admission::Allowed;
        }

        // Timestamps are appended in order, so the front is the oldest one
        // still inside the window. A zero-quota config has no timestamps to
        // derive from; the whole window is the wait.
        let remaining = match stamps.first() {
            Some(oldest) => self
                .config
                .window
                .saturating_sub(now.duration_since(*oldest)),
            None => self.config.window,
        };
        Admission::Denied {
            retry_after_secs: remaining.as_secs().max(1),
        }
    }

    /// Number of tracked keys (post-sweep keys only; test hook).
    pub fn tracked_keys(&self) -> usize {
        match self.windows.lock() {
            Ok(guard) => guard.len(),
            Err(e) => {
                tracing::error!("rate limiter lock poisoned: {e}");
                0
            }
        }
    }
}
