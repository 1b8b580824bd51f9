//! Planning: remaining-set computation and stable batch partition.

use std::collections::HashSet;

use crate::checkpoint::CheckpointRecord;
use crate::model::EntityTask;

/// Drop duplicate entity ids, keeping the first occurrence. A duplicate in
/// the work set is a caller error; it is logged and ignored so the
/// one-outcome-per-entity invariant holds.
pub fn dedupe_tasks(tasks: Vec<EntityTask>) -> Vec<EntityTask> {
    let mut seen = HashSet::new();
    let mut out = Vec::with_capacity(tasks.len());
    for task in tasks {
        if seen.insert(task.id.clone()) {
            out.push(task);
        } else {
            tracing::warn!(entity = %task.id, "duplicate entity in work set, ignoring");
        }
    }
    out
}

/// Entities not yet handled this cycle, in input (priority) order. Entities
/// in the checkpoint's completed set are excluded even if their recorded
/// outcome was a failure: a failed entity is accepted as handled for the
/// cycle so total cycle duration stays bounded.
pub fn remaining_tasks(tasks: &[EntityTask], record: &CheckpointRecord) -> Vec<EntityTask> {
    tasks
        .iter()
        .filter(|t| !record.is_completed(&t.id))
        .cloned()
        .collect()
}

/// Partition into fixed-size batches, preserving order within and across
/// batches (stable partition).
pub fn partition_batches(tasks: Vec<EntityTask>, batch_size: usize) -> Vec<Vec<EntityTask>> {
    let batch_size = batch_size.max(1);
    let mut batches = Vec::with_capacity(tasks.len().div_ceil(batch_size));
    let mut current = Vec::with_capacity(batch_size);
    for task in tasks {
        current.push(task);
        if current.len() == batch_size {
            batches.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        batches.push(current);
    }
    batches
}
