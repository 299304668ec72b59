//! Typed single-purpose dispatch loop
//!
//! A fixed set of threads takes items of one payload type from a bounded
//! collection and hands each to the same consumer function. `push` applies
//! backpressure when the collection is full. `stop` is soft: items already
//! queued are still consumed before the workers exit.
//!
//! Items are moved out of the collection, so workers never need a
//! placeholder value of the payload type.

use crate::config::PoolConfig;
use crate::error::{ConfigError, EventLoopError, PushError};
use crate::event_loop::collection::BlockingCollection;
use crate::scheduler::panic_message;
use parking_lot::Mutex;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle, ThreadId};
use tracing::{debug, error, warn};

/// Default bound of the event loop collection
pub const DEFAULT_EVENT_LOOP_CAPACITY: usize = 100;

/// Event loop configuration
#[derive(Debug, Clone)]
pub struct EventLoopConfig {
    /// Number of worker threads
    pub workers: usize,

    /// Maximum number of queued items before `push` blocks
    pub capacity: usize,

    /// Worker thread name prefix; threads are named `<prefix>-<id>`
    pub thread_name: String,
}

impl EventLoopConfig {
    /// Set the worker count (0 selects the default)
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = if workers == 0 {
            PoolConfig::default_workers()
        } else {
            workers
        };
        self
    }

    /// Set the collection bound
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Set the worker thread name prefix
    pub fn with_thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = name.into();
        self
    }

    /// Check the configuration before any thread is spawned
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.workers == 0 {
            return Err(ConfigError::ZeroWorkers);
        }
        if self.capacity == 0 {
            return Err(ConfigError::ZeroCapacity);
        }
        Ok(())
    }
}

impl Default for EventLoopConfig {
    fn default() -> Self {
        Self {
            workers: PoolConfig::default_workers(),
            capacity: DEFAULT_EVENT_LOOP_CAPACITY,
            thread_name: "taskpool-event-loop".to_string(),
        }
    }
}

type Consumer<T> = Arc<dyn Fn(T) + Send + Sync>;

/// Fixed consumer function dispatched over a bounded collection
pub struct EventLoop<T: Send + 'static> {
    collection: Arc<BlockingCollection<T>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    worker_threads: Vec<ThreadId>,
    worker_count: usize,
}

impl<T: Send + 'static> EventLoop<T> {
    /// Start `workers` threads feeding `consumer` (0 selects the default count)
    pub fn new<F>(consumer: F, workers: usize) -> Result<Self, EventLoopError>
    where
        F: Fn(T) + Send + Sync + 'static,
    {
        Self::with_config(consumer, EventLoopConfig::default().with_workers(workers))
    }

    /// Start an event loop from an explicit configuration
    pub fn with_config<F>(consumer: F, config: EventLoopConfig) -> Result<Self, EventLoopError>
    where
        F: Fn(T) + Send + Sync + 'static,
    {
        config.validate()?;

        let collection = Arc::new(BlockingCollection::new(config.capacity));
        let consumer: Consumer<T> = Arc::new(consumer);
        let mut handles = Vec::with_capacity(config.workers);

        for id in 0..config.workers {
            let collection_ref = collection.clone();
            let consumer = consumer.clone();
            let spawned = thread::Builder::new()
                .name(format!("{}-{}", config.thread_name, id))
                .spawn(move || Self::run_loop(id, collection_ref, consumer));

            match spawned {
                Ok(handle) => handles.push(handle),
                Err(err) => {
                    collection.complete_adding();
                    for handle in handles {
                        let _ = handle.join();
                    }
                    return Err(EventLoopError::Spawn(err));
                }
            }
        }

        debug!(
            workers = config.workers,
            capacity = config.capacity,
            "event loop started"
        );

        let worker_threads = handles.iter().map(|handle| handle.thread().id()).collect();

        Ok(Self {
            collection,
            workers: Mutex::new(handles),
            worker_threads,
            worker_count: config.workers,
        })
    }

    /// Queue an item, blocking while the collection is full
    ///
    /// After [`stop`](Self::stop) the item is handed back in
    /// [`PushError::Completed`].
    pub fn push(&self, item: T) -> Result<(), PushError<T>> {
        self.collection.add(item)
    }

    /// Queue an item without blocking
    pub fn try_push(&self, item: T) -> Result<(), PushError<T>> {
        self.collection.try_add(item)
    }

    /// Refuse new items; queued items are still consumed
    pub fn stop(&self) -> &Self {
        self.collection.complete_adding();
        self
    }

    /// Block until every worker thread has exited
    ///
    /// Call [`stop`](Self::stop) first, otherwise the workers never exit.
    /// Called from a consumer, `join` logs a warning and returns immediately.
    pub fn join(&self) -> &Self {
        if self.worker_threads.contains(&thread::current().id()) {
            warn!("join called from an event loop worker; ignoring it");
            return self;
        }

        let mut workers = self.workers.lock();
        for handle in workers.drain(..) {
            if let Err(payload) = handle.join() {
                error!(
                    panic = %panic_message(payload.as_ref()),
                    "event loop worker terminated abnormally"
                );
            }
        }
        self
    }

    /// Number of queued items
    pub fn len(&self) -> usize {
        self.collection.len()
    }

    /// Whether no items are queued
    pub fn is_empty(&self) -> bool {
        self.collection.is_empty()
    }

    /// Whether `stop` has been called
    pub fn is_stopped(&self) -> bool {
        self.collection.is_adding_completed()
    }

    /// Number of worker threads
    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    /// Maximum number of queued items
    pub fn capacity(&self) -> usize {
        self.collection.capacity()
    }

    fn run_loop(id: usize, collection: Arc<BlockingCollection<T>>, consumer: Consumer<T>) {
        let mut consumed: u64 = 0;
        while let Some(item) = collection.take() {
            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| consumer(item))) {
                error!(
                    worker = id,
                    panic = %panic_message(payload.as_ref()),
                    "event loop consumer panicked"
                );
            }
            consumed += 1;
        }
        debug!(worker = id, consumed, "event loop worker shutting down");
    }
}

impl<T: Send + 'static> fmt::Debug for EventLoop<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventLoop")
            .field("workers", &self.worker_count)
            .field("collection", &self.collection)
            .finish()
    }
}

impl<T: Send + 'static> Drop for EventLoop<T> {
    fn drop(&mut self) {
        self.stop().join();
    }
}
