//! Cooperative cancellation for long-running searches and scans.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A cloneable flag polled at the loop boundaries of every computation that
/// can run long: each elimination row, each BFS level, each construction
/// step, each benchmark trial. Dropping a token does not cancel anything;
/// only an explicit `cancel()` does.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}
