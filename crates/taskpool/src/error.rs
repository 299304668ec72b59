//! Error types for scheduling, result retrieval and configuration

use std::fmt;

/// Errors returned when a task cannot be handed to the pool
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScheduleError {
    /// The bounded task queue is at capacity
    #[error("Task queue is full (capacity {0})")]
    QueueFull(usize),

    /// The pool has been stopped and no longer accepts work
    #[error("Thread pool has been stopped")]
    ShutDown,

    /// The producer token was created by a different pool
    #[error("Producer token belongs to a different pool")]
    ForeignToken,
}

/// Errors observed when reading a result channel
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TaskError {
    /// The task body panicked; carries the panic message
    #[error("Task panicked: {0}")]
    Panicked(String),

    /// The task was dropped before producing a result
    #[error("Task was abandoned before producing a result")]
    Abandoned,

    /// The result was already taken from this channel
    #[error("Task result was already retrieved")]
    AlreadyRetrieved,
}

/// Invalid pool or event loop configuration
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// Worker count must be positive
    #[error("Worker count must be greater than zero")]
    ZeroWorkers,

    /// Batch size must be positive
    #[error("Batch size must be greater than zero")]
    ZeroBatchSize,

    /// A bounded queue needs room for at least one item
    #[error("Queue capacity must be greater than zero")]
    ZeroCapacity,

    /// A zero dequeue timeout would spin the workers
    #[error("Dequeue timeout must be greater than zero")]
    ZeroTimeout,
}

/// Errors raised while building a thread pool
#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    /// Configuration rejected by validation
    #[error("Invalid pool configuration: {0}")]
    Config(#[from] ConfigError),

    /// The OS refused to spawn a worker thread
    #[error("Failed to spawn worker thread: {0}")]
    Spawn(#[source] std::io::Error),
}

/// Errors raised while building an event loop
#[derive(Debug, thiserror::Error)]
pub enum EventLoopError {
    /// Configuration rejected by validation
    #[error("Invalid event loop configuration: {0}")]
    Config(#[from] ConfigError),

    /// The OS refused to spawn a worker thread
    #[error("Failed to spawn event loop thread: {0}")]
    Spawn(#[source] std::io::Error),
}

/// Errors raised by the countdown barrier
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BarrierError {
    /// `notify` was called more times than the barrier expected
    #[error("Barrier notified more than {expected} times")]
    Overcounted {
        /// Completion count the barrier was created with
        expected: usize,
    },
}

/// Error returned by [`EventLoop::push`](crate::EventLoop::push) and
/// [`EventLoop::try_push`](crate::EventLoop::try_push); hands the item back.
#[derive(PartialEq, Eq, Clone, Copy)]
pub enum PushError<T> {
    /// The collection is at capacity (non-blocking push only)
    Full(T),

    /// Adding has been completed; no more items are accepted
    Completed(T),
}

impl<T> PushError<T> {
    /// Recover the rejected item
    pub fn into_inner(self) -> T {
        match self {
            PushError::Full(item) | PushError::Completed(item) => item,
        }
    }
}

impl<T> fmt::Debug for PushError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PushError::Full(_) => f.write_str("Full(..)"),
            PushError::Completed(_) => f.write_str("Completed(..)"),
        }
    }
}

impl<T> fmt::Display for PushError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PushError::Full(_) => f.write_str("pushing into a full collection"),
            PushError::Completed(_) => f.write_str("pushing into a completed collection"),
        }
    }
}

impl<T> std::error::Error for PushError<T> {}
