//! Cooperative stop signal for a running cycle.
//!
//! The CLI wires Ctrl-C to `request_stop`; the scheduler checks the flag
//! before dispatching more work. In-flight entities finish (or hit their
//! timeout) and every outcome already collected for the current batch is
//! still checkpointed before the process exits.

use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Debug, Default)]
pub struct StopFlag {
    stop: AtomicBool,
}

impl StopFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::Relaxed);
    }

    pub fn is_stop_requested(&self) -> bool {
        self.stop.load(Ordering::Relaxed)
    }
}
