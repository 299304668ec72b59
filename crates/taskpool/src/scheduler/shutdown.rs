//! Per-pool shutdown signal

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// One-way shutdown flag shared by a pool and its workers
///
/// Once triggered it never reverts. Each pool owns its own signal; clones
/// observe the same flag.
#[derive(Debug, Clone, Default)]
pub struct ShutdownSignal {
    flag: Arc<AtomicBool>,
}

impl ShutdownSignal {
    /// Create an untriggered signal
    pub fn new() -> Self {
        Self::default()
    }

    /// Trigger the signal; returns `true` if this call was the first
    pub fn trigger(&self) -> bool {
        !self.flag.swap(true, Ordering::AcqRel)
    }

    /// Whether the signal has been triggered
    pub fn is_triggered(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}
