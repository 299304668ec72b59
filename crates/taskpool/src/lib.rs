//! Taskpool
//!
//! A fixed pool of worker threads executing independently submitted units of
//! work. This crate provides:
//! - **Scheduler**: worker lifecycle, bulk batched consumption, one-shot result
//!   channels and cooperative shutdown (`scheduler` module)
//! - **Task queue**: the MPMC queue the scheduler dispatches through (`queue` module)
//! - **Sync utilities**: a counting completion barrier and a deferred-execution
//!   drain queue (`sync` module)
//! - **Event loop**: a typed single-purpose dispatch loop over a bounded
//!   collection (`event_loop` module)
//!
//! # Example
//!
//! ```rust,ignore
//! use taskpool::ThreadPool;
//!
//! let pool = ThreadPool::new(4)?;
//! let answer = pool.schedule(|| 6 * 7)?;
//! assert_eq!(answer.wait()?, 42);
//!
//! let add = pool.bind(|(a, b): (i32, i32)| a + b);
//! assert_eq!(add.call((1, 2))?.wait()?, 3);
//!
//! pool.stop().join();
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

// ============================================================================
// Core Modules
// ============================================================================

/// Pool configuration and batch-size tiers
pub mod config;

/// Error types
pub mod error;

/// Task queue: single/bulk enqueue, timed bulk dequeue, affinity tokens
pub mod queue;

/// Worker pool, tasks, result channels and the callable binder
pub mod scheduler;

/// Counting barrier and deferred-execution drain queue
pub mod sync;

/// Typed single-purpose dispatch loop
pub mod event_loop;

// ============================================================================
// Re-exports
// ============================================================================

pub use config::{
    PoolConfig, ShutdownPolicy, BATCH_BALANCED, BATCH_HEAVIER, BATCH_HEAVY, BATCH_LIGHT,
    BATCH_SPARSE,
};
pub use error::{
    BarrierError, ConfigError, EventLoopError, PoolError, PushError, ScheduleError, TaskError,
};
pub use event_loop::{EventLoop, EventLoopConfig};
pub use queue::{ConsumerToken, EnqueueError, ProducerToken, TaskQueue};
pub use scheduler::{
    bind, Callable, PoolHandle, PoolStats, Promise, ResultChannel, ShutdownSignal, Task,
    ThreadPool,
};
pub use sync::{AsyncExecutor, CountdownBarrier};
