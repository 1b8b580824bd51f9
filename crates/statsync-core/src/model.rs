//! Core engine types: cycle keys, entity tasks, payloads, outcomes.

use serde::{Deserialize, Serialize};

/// Opaque entity identifier (e.g. a channel id).
pub type EntityId = String;

/// Key identifying one work cycle. One cycle per UTC calendar day; a new day
/// starts an empty cycle and supersedes the old one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CycleKey(String);

impl CycleKey {
    /// Cycle key for the current UTC day.
    pub fn today() -> Self {
        Self(chrono::Utc::now().date_naive().format("%Y-%m-%d").to_string())
    }

    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CycleKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// One schedulable unit of work: an entity plus its priority hint.
/// Immutable for the duration of a cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityTask {
    pub id: EntityId,
    /// Lower value = dispatched earlier. Supplied by the work-set provider.
    pub priority: i64,
}

impl EntityTask {
    pub fn new(id: impl Into<EntityId>, priority: i64) -> Self {
        Self {
            id: id.into(),
            priority,
        }
    }
}

/// Statistics fetched for one entity, in the persistence schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsPayload {
    pub views: u64,
    pub subscribers: u64,
    pub item_count: u64,
}

/// Result of processing one entity within a cycle. Exactly one outcome is
/// recorded per entity per cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Fetched and persisted; `attempts` includes the successful attempt.
    Success {
        payload: StatsPayload,
        attempts: u32,
    },
    /// Gave up (permanent error or retries exhausted). Accepted as handled
    /// for the cycle; a later cycle retries from scratch.
    Failure { reason: String, attempts: u32 },
    /// Already completed in a prior run of the same cycle.
    Skipped,
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success { .. })
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Outcome::Failure { .. })
    }
}
