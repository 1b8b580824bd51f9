//! Shared quota budget across workers.
//!
//! One `QuotaGuard` instance is injected into every worker. The estimate is
//! best-effort: it is derived from observed call costs, not a server
//! round-trip, so the real server-side budget may disagree. A server-side
//! quota rejection is handled as a per-entity failure plus `mark_rejected`,
//! never as a guard defect.

use std::sync::atomic::{AtomicU64, Ordering};

/// Tracks the remaining budget of the shared, externally-capped API quota.
/// Never raises a hard error; insufficient quota is a normal scheduling
/// signal, not a fault.
#[derive(Debug)]
pub struct QuotaGuard {
    ceiling: u64,
    consumed: AtomicU64,
}

impl QuotaGuard {
    /// Guard with a fresh budget.
    pub fn new(ceiling: u64) -> Self {
        Self {
            ceiling,
            consumed: AtomicU64::new(0),
        }
    }

    /// Guard resuming mid-cycle: `already_used` units were consumed by a
    /// prior run of the same cycle.
    pub fn with_consumed(ceiling: u64, already_used: u64) -> Self {
        Self {
            ceiling,
            consumed: AtomicU64::new(already_used.min(ceiling)),
        }
    }

    /// Current budget estimate. Best-effort, not a reservation.
    pub fn remaining(&self) -> u64 {
        self.ceiling
            .saturating_sub(self.consumed.load(Ordering::Relaxed))
    }

    /// Units consumed so far (for reporting and checkpointing).
    pub fn consumed(&self) -> u64 {
        self.consumed.load(Ordering::Relaxed).min(self.ceiling)
    }

    /// Pre-batch gate: true iff the estimate covers `estimated_cost`.
    pub fn sufficient_for(&self, estimated_cost: u64) -> bool {
        self.remaining() >= estimated_cost
    }

    /// Decrement the local estimate after a call completes. Non-blocking.
    pub fn record_consumption(&self, amount: u64) {
        self.consumed.fetch_add(amount, Ordering::AcqRel);
    }

    /// Re-seed the estimate from a checkpoint: a prior run of the same cycle
    /// already consumed `already_used` units.
    pub fn seed_consumed(&self, already_used: u64) {
        self.consumed
            .store(already_used.min(self.ceiling), Ordering::Release);
    }

    /// Server rejected a call for quota reasons: drive the estimate to zero
    /// so the next batch gate stops issuing work.
    pub fn mark_rejected(&self) {
        self.consumed.store(self.ceiling, Ordering::Release);
    }

    /// External budget renewal (e.g. the daily reset window).
    pub fn reset(&self) {
        self.consumed.store(0, Ordering::Release);
    }
}
