//! Deferred-execution drain queue
//!
//! Workers hand side effects (typically ordered output) to a designated
//! thread with [`AsyncExecutor::execute_async`]; that thread runs them with
//! [`AsyncExecutor::run`]. Actions from one producing thread run in the order
//! they were enqueued; no order holds across producers.
//!
//! `run` is a snapshot drain: it returns as soon as the queue is observed
//! empty. Actions enqueued concurrently with or after that observation may be
//! left for the next call. For a complete drain, stop every producer first.

use crate::scheduler::{panic_message, Task};
use crossbeam::queue::SegQueue;
use std::fmt;
use tracing::error;

/// Unbounded queue of deferred actions plus a non-blocking drain loop
#[derive(Default)]
pub struct AsyncExecutor {
    queue: SegQueue<Task>,
}

impl AsyncExecutor {
    /// Create an empty executor
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue an action without blocking
    pub fn execute_async<F>(&self, action: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.queue.push(Task::new(action));
    }

    /// Run one queued action, if any; returns whether one was available
    pub fn run_one(&self) -> bool {
        match self.queue.pop() {
            Some(action) => {
                if let Err(payload) = action.run() {
                    error!(
                        panic = %panic_message(payload.as_ref()),
                        "deferred action panicked"
                    );
                }
                true
            }
            None => false,
        }
    }

    /// Run queued actions until the queue is observed empty
    ///
    /// Returns the number of actions run. A panicking action is logged and
    /// does not stop the drain.
    pub fn run(&self) -> usize {
        let mut executed = 0;
        while self.run_one() {
            executed += 1;
        }
        executed
    }

    /// Number of queued actions
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Whether no actions are queued
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

impl fmt::Debug for AsyncExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncExecutor")
            .field("queued", &self.queue.len())
            .finish()
    }
}
