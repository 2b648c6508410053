//! Running tally of landing outcomes.
//!
//! A slot is counted once, on the first frame that reports a terminal outcome for it,
//! and stays counted until the next reset.

use crate::network::protocol::LandingStatus;
use std::collections::HashSet;

/// Success/failure counts since the last restart.
#[derive(Debug, Clone, Default)]
pub struct LandingStats {
    success: u32,
    failure: u32,
    counted: HashSet<usize>,
}

impl LandingStats {
    /// Create an empty tally.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Count outcomes for slots not counted yet.
    pub fn observe(&mut self, landing: &[Option<LandingStatus>]) {
        for (index, status) in landing.iter().enumerate() {
            let Some(status) = status else { continue };
            if !self.counted.insert(index) {
                continue;
            }
            if status.is_success() {
                self.success += 1;
            } else {
                self.failure += 1;
            }
            tracing::info!(index, outcome = status.as_str(), "Entity landed");
        }
    }

    /// Forget all counts.
    pub fn reset(&mut self) {
        self.success = 0;
        self.failure = 0;
        self.counted.clear();
    }

    /// Safe, good and ok landings.
    #[must_use]
    pub fn success(&self) -> u32 {
        self.success
    }

    /// Unsafe landings.
    #[must_use]
    pub fn failure(&self) -> u32 {
        self.failure
    }

    /// All counted landings.
    #[must_use]
    pub fn total(&self) -> u32 {
        self.success + self.failure
    }

    /// Percentage of successful landings, 0 when nothing has landed.
    #[must_use]
    pub fn success_rate(&self) -> f64 {
        match self.total() {
            0 => 0.0,
            total => f64::from(self.success) / f64::from(total) * 100.0,
        }
    }
}
