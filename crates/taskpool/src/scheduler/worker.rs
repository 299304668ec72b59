//! Worker thread that executes Tasks
//!
//! Each worker repeatedly fetches a batch from the shared queue with its own
//! consumer token, runs the batch in fetch order, then checks the pool's
//! shutdown signal. The timed fetch is the only place a worker blocks.

use crate::config::ShutdownPolicy;
use crate::scheduler::pool::PoolShared;
use crate::scheduler::task::{panic_message, Task};
use std::io;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread::{self, JoinHandle, ThreadId};
use tracing::{debug, error};

/// Worker thread that executes Tasks
pub(crate) struct Worker {
    /// Worker ID
    id: usize,

    /// Worker thread handle
    handle: Option<JoinHandle<()>>,
}

impl Worker {
    /// Create a new Worker
    pub(crate) fn new(id: usize) -> Self {
        Self { id, handle: None }
    }

    /// Start the worker thread
    pub(crate) fn start(&mut self, shared: Arc<PoolShared>) -> io::Result<()> {
        let id = self.id;
        let handle = thread::Builder::new()
            .name(format!("{}-{}", shared.config.thread_name, id))
            .spawn(move || Worker::run_loop(id, shared))?;

        self.handle = Some(handle);
        Ok(())
    }

    /// Wait for the worker thread to exit
    ///
    /// Returns `Ok(())` if the thread was never started or already joined.
    pub(crate) fn join(&mut self) -> thread::Result<()> {
        match self.handle.take() {
            Some(handle) => handle.join(),
            None => Ok(()),
        }
    }

    /// OS thread id, while the thread has not been joined
    pub(crate) fn thread_id(&self) -> Option<ThreadId> {
        self.handle.as_ref().map(|handle| handle.thread().id())
    }

    /// Get the worker ID
    pub(crate) fn id(&self) -> usize {
        self.id
    }

    /// Check if the worker thread is still running
    #[cfg(test)]
    pub(crate) fn is_running(&self) -> bool {
        self.handle
            .as_ref()
            .map(|handle| !handle.is_finished())
            .unwrap_or(false)
    }

    /// Worker thread main loop
    fn run_loop(id: usize, shared: Arc<PoolShared>) {
        let token = shared.queue.consumer_token();
        let batch_size = shared.config.batch_size;
        let timeout = shared.config.dequeue_timeout;
        let mut batch: Vec<Task> = Vec::with_capacity(batch_size);

        // Set once shutdown is observed under the Drain policy. The queue is
        // closed before the signal is raised, so an empty fetch issued after
        // this point means no task can ever arrive again.
        let mut draining = false;

        debug!(worker = id, "worker started");

        loop {
            let fetched = shared
                .queue
                .wait_dequeue_bulk_timed(&token, &mut batch, batch_size, timeout);

            for task in batch.drain(..) {
                if let Err(payload) = task.run() {
                    shared.counters.panicked.fetch_add(1, Ordering::Relaxed);
                    error!(
                        worker = id,
                        panic = %panic_message(payload.as_ref()),
                        "detached task panicked"
                    );
                }
                shared.counters.executed.fetch_add(1, Ordering::Relaxed);
            }

            if draining && fetched == 0 {
                break;
            }

            if shared.shutdown.is_triggered() {
                match shared.config.shutdown_policy {
                    ShutdownPolicy::Abandon => break,
                    ShutdownPolicy::Drain => draining = true,
                }
            }
        }

        debug!(worker = id, dequeued = token.dequeued(), "worker shutting down");
    }
}
