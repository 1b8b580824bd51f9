//! In-memory checkpoint store for tests.
//!
//! Same contract as the SQLite backend, plus a failure toggle so tests can
//! exercise the `StorageUnavailable` escalation path.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use crate::error::StorageUnavailable;
use crate::model::{CycleKey, EntityId, Outcome};

use super::store::CheckpointStore;
use super::types::{unix_timestamp, CheckpointRecord, FailureRecord};

#[derive(Debug, Clone, Default)]
struct CycleState {
    outcomes: HashMap<EntityId, Outcome>,
    total: u64,
    quota_used: u64,
    started_at: i64,
    last_updated_at: i64,
    flushes: u64,
}

/// Map-backed checkpoint store. Not durable; test use only.
#[derive(Default)]
pub struct MemoryCheckpointStore {
    cycles: Mutex<HashMap<String, CycleState>>,
    unavailable: AtomicBool,
}

impl MemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate the backing store going away (or coming back).
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::Relaxed);
    }

    /// Number of flushes observed for a cycle (one per checkpointed batch).
    pub fn flush_count(&self, cycle: &CycleKey) -> u64 {
        self.cycles
            .lock()
            .unwrap()
            .get(cycle.as_str())
            .map(|s| s.flushes)
            .unwrap_or(0)
    }

    fn check_available(&self) -> Result<(), StorageUnavailable> {
        if self.unavailable.load(Ordering::Relaxed) {
            return Err(StorageUnavailable("memory store marked offline".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl CheckpointStore for MemoryCheckpointStore {
    async fn load(&self, cycle: &CycleKey) -> Result<CheckpointRecord, StorageUnavailable> {
        self.check_available()?;
        let cycles = self.cycles.lock().unwrap();
        let mut record = CheckpointRecord::empty(cycle.clone());
        let Some(state) = cycles.get(cycle.as_str()) else {
            return Ok(record);
        };
        record.total = state.total;
        record.quota_used = state.quota_used;
        record.started_at = state.started_at;
        record.last_updated_at = state.last_updated_at;
        for (id, outcome) in &state.outcomes {
            record.completed.insert(id.clone());
            match outcome {
                Outcome::Success { .. } => record.success += 1,
                Outcome::Failure { reason, attempts } => {
                    record.errors += 1;
                    record.failures.push(FailureRecord {
                        id: id.clone(),
                        reason: reason.clone(),
                        attempts: *attempts,
                        timestamp: state.last_updated_at,
                    });
                }
                Outcome::Skipped => {}
            }
        }
        Ok(record)
    }

    async fn append(
        &self,
        cycle: &CycleKey,
        entity: &EntityId,
        outcome: &Outcome,
    ) -> Result<(), StorageUnavailable> {
        self.check_available()?;
        if matches!(outcome, Outcome::Skipped) {
            return Ok(());
        }
        let mut cycles = self.cycles.lock().unwrap();
        let state = cycles.entry(cycle.as_str().to_string()).or_insert_with(|| {
            let now = unix_timestamp();
            CycleState {
                started_at: now,
                last_updated_at: now,
                ..Default::default()
            }
        });
        state.outcomes.insert(entity.clone(), outcome.clone());
        state.last_updated_at = unix_timestamp();
        Ok(())
    }

    async fn record_cycle_stats(
        &self,
        cycle: &CycleKey,
        total: u64,
        quota_used: u64,
    ) -> Result<(), StorageUnavailable> {
        self.check_available()?;
        let mut cycles = self.cycles.lock().unwrap();
        let state = cycles.entry(cycle.as_str().to_string()).or_insert_with(|| {
            let now = unix_timestamp();
            CycleState {
                started_at: now,
                last_updated_at: now,
                ..Default::default()
            }
        });
        state.total = total;
        state.quota_used = quota_used;
        state.last_updated_at = unix_timestamp();
        Ok(())
    }

    async fn flush(&self, cycle: &CycleKey) -> Result<(), StorageUnavailable> {
        self.check_available()?;
        let mut cycles = self.cycles.lock().unwrap();
        if let Some(state) = cycles.get_mut(cycle.as_str()) {
            state.flushes += 1;
        }
        Ok(())
    }
}
