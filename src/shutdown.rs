//! Process-wide shutdown flag, set by the ctrlc handler.
//!
//! The CLI checks it between a batch move and its commit: an interrupted batch
//! is rolled back instead of committed. Relaxed atomics are enough for a
//! one-way flag.
use std::sync::atomic::{AtomicBool, Ordering};

static SHUTDOWN: AtomicBool = AtomicBool::new(false);

/// Request a cooperative shutdown (idempotent).
#[inline]
pub fn request() {
    SHUTDOWN.store(true, Ordering::Relaxed);
}

#[inline]
pub fn is_requested() -> bool {
    SHUTDOWN.load(Ordering::Relaxed)
}
