//! Per-batch progress snapshots for console/log output.
//!
//! The observer callback is informational only; it has no control-flow
//! effect on the cycle.

/// Cumulative counters after a checkpointed batch.
#[derive(Debug, Clone)]
pub struct ProgressStats {
    /// Batches fully drained and checkpointed so far.
    pub batches_done: usize,
    /// Batches planned for this run.
    pub batch_count: usize,
    /// Entities processed this run (success + failure).
    pub processed: u64,
    pub success: u64,
    pub errors: u64,
    /// Quota guard estimate after the batch.
    pub quota_remaining: u64,
}

impl ProgressStats {
    /// Fraction of planned batches completed, in [0.0, 1.0].
    pub fn fraction(&self) -> f64 {
        if self.batch_count == 0 {
            return 1.0;
        }
        (self.batches_done as f64 / self.batch_count as f64).min(1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fraction_handles_empty_plan() {
        let p = ProgressStats {
            batches_done: 0,
            batch_count: 0,
            processed: 0,
            success: 0,
            errors: 0,
            quota_remaining: 0,
        };
        assert_eq!(p.fraction(), 1.0);
    }

    #[test]
    fn fraction_midway() {
        let p = ProgressStats {
            batches_done: 1,
            batch_count: 4,
            processed: 10,
            success: 9,
            errors: 1,
            quota_remaining: 90,
        };
        assert!((p.fraction() - 0.25).abs() < 1e-9);
    }
}
