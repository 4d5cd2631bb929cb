// crates/core/src/config.rs
//! Pipeline tunables.

use std::time::Duration;

use worldsmith_types::Quality;

use crate::worldgen::ExtractionCandidates;

/// Credit price per quality tier.
#[derive(Debug, Clone)]
pub struct CreditCosts {
    pub draft: u64,
    pub standard: u64,
    pub immersive: u64,
}

impl Default for CreditCosts {
    fn default() -> Self {
        Self {
            draft: 1,
            standard: 1,
            immersive: 2,
        }
    }
}

impl CreditCosts {
    pub fn cost_for(&self, quality: Quality) -> u64 {
        match quality {
            Quality::Draft => self.draft,
            Quality::Standard => self.standard,
            Quality::Immersive => self.immersive,
        }
    }
}

/// Orchestrator configuration.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Delay between operation polls during `creating_world`.
    pub poll_interval: Duration,
    /// Poll budget; 120 × 5s ≈ a 10-minute ceiling.
    pub poll_max_attempts: u32,
    /// Delay between result fetches while assets are still propagating.
    pub result_retry_interval: Duration,
    /// Result fetch budget; 5 × 3s ≈ a 15-second ceiling.
    pub result_retry_attempts: u32,
    /// Used when the caller supplied no image and synthesis failed. Without
    /// it, that situation fails the pipeline.
    pub fallback_image_url: Option<String>,
    /// Whether a cancelled job gets its debit back. Off by default; see
    /// DESIGN.md for the policy decision.
    pub refund_on_cancel: bool,
    pub credit_costs: CreditCosts,
    pub extraction: ExtractionCandidates,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            poll_max_attempts: 120,
            result_retry_interval: Duration::from_secs(3),
            result_retry_attempts: 5,
            fallback_image_url: None,
            refund_on_cancel: false,
            credit_costs: CreditCosts::default(),
            extraction: ExtractionCandidates::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cost_scales_with_quality() {
        let costs = CreditCosts::default();
        assert_eq!(costs.cost_for(Quality::Draft), 1);
        assert_eq!(costs.cost_for(Quality::Standard), 1);
        assert_eq!(costs.cost_for(Quality::Immersive), 2);
    }

    #[test]
    fn test_default_budgets() {
        let config = PipelineConfig::default();
        assert_eq!(config.poll_max_attempts, 120);
        assert_eq!(config.result_retry_attempts, 5);
        assert!(!config.refund_on_cancel);
    }
}
