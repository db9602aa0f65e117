//! Cooperative cancellation for a single in-flight exchange.
//!
//! The caller raises the flag; the engine polls it at suspension points
//! (chunk boundaries, between planning and tool calls) and clears it with a
//! compare-and-clear once it acts on it. At most one request is pending.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// A shared, clearable stop request.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag {
    requested: Arc<AtomicBool>,
}

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the current exchange to stop.
    pub fn request(&self) {
        self.requested.store(true, Ordering::SeqCst);
    }

    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }

    /// Consume a pending request.
    ///
    /// Returns `true` for exactly one observer per request.
    pub fn take(&self) -> bool {
        self.requested
            .compare_exchange(true, false, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    /// Drop any stale request left over from a previous exchange.
    pub fn reset(&self) {
        self.requested.store(false, Ordering::SeqCst);
    }
}
