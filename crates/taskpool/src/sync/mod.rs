//! Synchronization utilities
//!
//! Used by callers and workers to coordinate side effects outside the main
//! schedule/result path:
//! - [`CountdownBarrier`]: wait for N completions
//! - [`AsyncExecutor`]: defer actions to a draining thread

mod barrier;
mod executor;

pub use barrier::CountdownBarrier;
pub use executor::AsyncExecutor;
