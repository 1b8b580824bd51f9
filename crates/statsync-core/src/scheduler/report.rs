//! The cycle report returned to the caller.

use std::time::Duration;

use crate::model::CycleKey;

/// Aggregate result of one `run_cycle` call. Counters are cumulative for the
/// cycle (prior runs of the same cycle key included), so a resumed run
/// reports the cycle's true totals.
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub cycle: CycleKey,
    /// Entities in the work set.
    pub total: u64,
    pub success: u64,
    pub errors: u64,
    /// Entities excluded at planning because a prior run already handled them.
    pub skipped: u64,
    /// True if the cycle stopped early at the quota gate. Terminal success,
    /// not an error; the remaining entities were never attempted.
    pub quota_exhausted: bool,
    /// True if an external stop request ended the cycle early.
    pub stopped: bool,
    pub duration: Duration,
}

impl CycleReport {
    /// True if every entity in the work set has an outcome recorded.
    /// Skipped entities are already counted in `success`/`errors` (the
    /// counters are cumulative for the cycle).
    pub fn complete(&self) -> bool {
        self.success + self.errors >= self.total && !self.quota_exhausted
    }
}
