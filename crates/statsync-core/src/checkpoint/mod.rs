//! Durable per-cycle progress records.
//!
//! The checkpoint store is the sole path to durable engine state: which
//! entities a cycle has already handled, the failure list, counters, and the
//! quota consumed so far. The scheduler reloads it at startup to compute the
//! remaining work set, so a crash or stop never loses completed batches.

pub mod memory;
pub mod sqlite;
pub mod store;
pub mod types;

pub use memory::MemoryCheckpointStore;
pub use sqlite::SqliteCheckpointStore;
pub use store::CheckpointStore;
pub use types::{CheckpointRecord, FailureRecord};
