//! The abstract checkpoint store contract.

use async_trait::async_trait;

use crate::error::StorageUnavailable;
use crate::model::{CycleKey, EntityId, Outcome};

use super::types::CheckpointRecord;

/// Durable record of per-cycle progress.
///
/// Two backends: `SqliteCheckpointStore` for production and
/// `MemoryCheckpointStore` for tests. The scheduler is the only writer; it
/// drains a whole batch before appending, so appends never interleave across
/// batches.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Load the record for `cycle`, or an empty record if none exists.
    /// `StorageUnavailable` means the backing store cannot be reached; the
    /// scheduler decides whether to abort (it does).
    async fn load(&self, cycle: &CycleKey) -> Result<CheckpointRecord, StorageUnavailable>;

    /// Record one outcome. Idempotent: the same `(cycle, entity)` with the
    /// same outcome is a no-op; a different outcome overwrites (last write
    /// wins, since a later attempt reflects more current truth). `Skipped`
    /// outcomes are not persisted; the entity is already in the record.
    async fn append(
        &self,
        cycle: &CycleKey,
        entity: &EntityId,
        outcome: &Outcome,
    ) -> Result<(), StorageUnavailable>;

    /// Update the cycle's running counters: planned total and quota consumed
    /// so far. Called alongside each batch checkpoint.
    async fn record_cycle_stats(
        &self,
        cycle: &CycleKey,
        total: u64,
        quota_used: u64,
    ) -> Result<(), StorageUnavailable>;

    /// Durability barrier: all prior appends for `cycle` are durable before
    /// this returns.
    async fn flush(&self, cycle: &CycleKey) -> Result<(), StorageUnavailable>;
}
