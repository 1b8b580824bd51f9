//! Types used by the checkpoint store.

use std::collections::HashSet;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::model::{CycleKey, EntityId};

/// One recorded failure, kept for diagnostics (`status` output); failures are
/// still counted as handled for the cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureRecord {
    pub id: EntityId,
    pub reason: String,
    pub attempts: u32,
    pub timestamp: i64,
}

/// In-memory view of one cycle's durable progress. Loaded at startup,
/// appended to after every batch; never edited retroactively.
#[derive(Debug, Clone)]
pub struct CheckpointRecord {
    pub cycle: CycleKey,
    /// Entities already handled this cycle (success or accepted failure).
    /// Members are never re-dispatched within the cycle.
    pub completed: HashSet<EntityId>,
    pub failures: Vec<FailureRecord>,
    pub total: u64,
    pub success: u64,
    pub errors: u64,
    /// Quota units consumed by prior runs of this cycle; re-seeds the guard
    /// on resume.
    pub quota_used: u64,
    pub started_at: i64,
    pub last_updated_at: i64,
}

impl CheckpointRecord {
    /// Fresh record for a cycle with no prior progress.
    pub fn empty(cycle: CycleKey) -> Self {
        let now = unix_timestamp();
        Self {
            cycle,
            completed: HashSet::new(),
            failures: Vec::new(),
            total: 0,
            success: 0,
            errors: 0,
            quota_used: 0,
            started_at: now,
            last_updated_at: now,
        }
    }

    pub fn is_completed(&self, id: &str) -> bool {
        self.completed.contains(id)
    }
}

/// Current time as Unix seconds (for record timestamps).
pub(crate) fn unix_timestamp() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_record_has_no_progress() {
        let rec = CheckpointRecord::empty(CycleKey::new("2026-08-27"));
        assert!(rec.completed.is_empty());
        assert!(rec.failures.is_empty());
        assert_eq!(rec.success, 0);
        assert_eq!(rec.errors, 0);
        assert_eq!(rec.quota_used, 0);
        assert!(!rec.is_completed("UC123"));
    }
}
