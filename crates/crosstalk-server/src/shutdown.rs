//! One-shot process-wide shutdown latch.
//!
//! Cancellation in the server is cooperative and poll-based: every
//! blocking read uses a bounded wait, then checks this signal, then
//! retries. The latch transitions from running to stopping exactly once
//! and never resets.

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

/// Broadcast-readable stop flag shared by the accept loop and every
/// session handler.
#[derive(Debug, Clone, Default)]
pub struct ShutdownSignal(Arc<AtomicBool>);

impl ShutdownSignal {
    /// Create a signal in the running state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Move to the stopping state. Idempotent.
    pub fn trigger(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// Whether shutdown has been requested.
    pub fn is_stopping(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}
