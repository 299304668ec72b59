//! Thread pool coordinating worker threads
//!
//! [`ThreadPool`] owns the worker threads; [`PoolHandle`] is a cheap,
//! cloneable submission handle that tasks can capture to schedule nested work.

use crate::config::PoolConfig;
use crate::error::{PoolError, ScheduleError};
use crate::queue::{EnqueueError, ProducerToken, TaskQueue};
use crate::scheduler::callable::Callable;
use crate::scheduler::result::{self, ResultChannel};
use crate::scheduler::shutdown::ShutdownSignal;
use crate::scheduler::task::{panic_message, Task};
use crate::scheduler::worker::Worker;
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, ThreadId};
use tracing::{debug, error, info, warn};

/// Pool statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Tasks admitted to the queue
    pub scheduled: u64,

    /// Tasks refused by the queue (full or stopped)
    pub rejected: u64,

    /// Tasks run by a worker, including ones that panicked
    pub executed: u64,

    /// Tasks without a result channel whose body panicked
    pub panicked: u64,

    /// Tasks dropped unexecuted at shutdown
    pub abandoned: u64,
}

#[derive(Debug, Default)]
pub(crate) struct PoolCounters {
    pub(crate) scheduled: AtomicU64,
    pub(crate) rejected: AtomicU64,
    pub(crate) executed: AtomicU64,
    pub(crate) panicked: AtomicU64,
    pub(crate) abandoned: AtomicU64,
}

/// State shared between the pool, its handles and its workers
pub(crate) struct PoolShared {
    pub(crate) queue: TaskQueue<Task>,
    pub(crate) shutdown: ShutdownSignal,
    pub(crate) config: PoolConfig,
    pub(crate) counters: PoolCounters,
}

impl PoolShared {
    pub(crate) fn new(config: PoolConfig) -> Self {
        Self {
            queue: TaskQueue::with_capacity(config.capacity),
            shutdown: ShutdownSignal::new(),
            config,
            counters: PoolCounters::default(),
        }
    }

    /// Close the queue, then raise the shutdown signal
    ///
    /// Workers rely on this order: once they observe the signal, the queue
    /// is guaranteed closed. Returns `true` on the first call.
    pub(crate) fn begin_shutdown(&self) -> bool {
        self.queue.close();
        self.shutdown.trigger()
    }
}

/// Cloneable handle for submitting work to a [`ThreadPool`]
#[derive(Clone)]
pub struct PoolHandle {
    shared: Arc<PoolShared>,
}

impl PoolHandle {
    /// Schedule a closure and return a channel for its result
    ///
    /// Arguments are bound by moving them into the closure. A panic in the
    /// closure is delivered through the channel as
    /// [`TaskError::Panicked`](crate::TaskError::Panicked).
    pub fn schedule<F, R>(&self, f: F) -> Result<ResultChannel<R>, ScheduleError>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        self.schedule_inner(None, f)
    }

    /// Schedule `f(args)`, binding `args` now
    ///
    /// Use a tuple to bind several arguments.
    pub fn schedule_with<F, A, R>(&self, f: F, args: A) -> Result<ResultChannel<R>, ScheduleError>
    where
        F: FnOnce(A) -> R + Send + 'static,
        A: Send + 'static,
        R: Send + 'static,
    {
        self.schedule_inner(None, move || f(args))
    }

    /// Schedule a closure through a producer affinity token
    ///
    /// A token created by another pool is refused with
    /// [`ScheduleError::ForeignToken`].
    pub fn schedule_with_token<F, R>(
        &self,
        token: &ProducerToken,
        f: F,
    ) -> Result<ResultChannel<R>, ScheduleError>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        self.schedule_inner(Some(token), f)
    }

    /// Schedule a closure without a result channel
    ///
    /// Returns whether the task was accepted. A panic in the closure is
    /// logged and counted, never reported to the caller.
    pub fn schedule_and_forget<F, R>(&self, f: F) -> bool
    where
        F: FnOnce() -> R + Send + 'static,
    {
        self.submit(None, Self::detached(f)).is_ok()
    }

    /// Schedule a closure without a result channel through a producer token
    ///
    /// Returns `false` for a token created by another pool.
    pub fn schedule_and_forget_with_token<F, R>(&self, token: &ProducerToken, f: F) -> bool
    where
        F: FnOnce() -> R + Send + 'static,
    {
        self.submit(Some(token), Self::detached(f)).is_ok()
    }

    /// Submit pre-built tasks in one queue operation
    ///
    /// Returns `true` only if every task was admitted. Admission is
    /// all-or-nothing: on `false`, none of the tasks will run.
    pub fn schedule_bulk<I>(&self, tasks: I) -> bool
    where
        I: IntoIterator<Item = Task>,
    {
        self.submit_bulk(None, tasks.into_iter().collect())
    }

    /// Submit pre-built tasks in one queue operation through a producer token
    ///
    /// Returns `false` for a token created by another pool.
    pub fn schedule_bulk_with_token<I>(&self, token: &ProducerToken, tasks: I) -> bool
    where
        I: IntoIterator<Item = Task>,
    {
        self.submit_bulk(Some(token), tasks.into_iter().collect())
    }

    /// Create a producer affinity token for this pool's queue
    pub fn producer_token(&self) -> ProducerToken {
        self.shared.queue.producer_token()
    }

    /// Bind `target` to this pool; see [`Callable`]
    pub fn bind<A, R, F>(&self, target: F) -> Callable<A, R>
    where
        F: Fn(A) -> R + Send + Sync + 'static,
        A: Send + 'static,
        R: Send + 'static,
    {
        Callable::new(self.clone(), target)
    }

    /// Whether `stop()` has been called on the pool
    pub fn is_stopped(&self) -> bool {
        self.shared.shutdown.is_triggered()
    }

    /// Number of tasks waiting in the queue
    pub fn queued(&self) -> usize {
        self.shared.queue.len()
    }

    /// Snapshot of the pool counters
    pub fn stats(&self) -> PoolStats {
        let counters = &self.shared.counters;
        PoolStats {
            scheduled: counters.scheduled.load(Ordering::Relaxed),
            rejected: counters.rejected.load(Ordering::Relaxed),
            executed: counters.executed.load(Ordering::Relaxed),
            panicked: counters.panicked.load(Ordering::Relaxed),
            abandoned: counters.abandoned.load(Ordering::Relaxed),
        }
    }

    fn schedule_inner<F, R>(
        &self,
        token: Option<&ProducerToken>,
        f: F,
    ) -> Result<ResultChannel<R>, ScheduleError>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        let (promise, channel) = result::channel();
        self.submit(token, Task::new(move || promise.complete_with(f)))?;
        Ok(channel)
    }

    fn detached<F, R>(f: F) -> Task
    where
        F: FnOnce() -> R + Send + 'static,
    {
        Task::new(move || {
            f();
        })
    }

    fn submit(&self, token: Option<&ProducerToken>, task: Task) -> Result<(), ScheduleError> {
        let queue = &self.shared.queue;
        if !self.accepts(token) {
            self.shared.counters.rejected.fetch_add(1, Ordering::Relaxed);
            debug!("task rejected: foreign producer token");
            return Err(ScheduleError::ForeignToken);
        }
        let outcome = match token {
            Some(token) => queue.enqueue_with(token, task),
            None => queue.enqueue(task),
        };

        match outcome {
            Ok(()) => {
                self.shared.counters.scheduled.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            Err(err) => {
                self.shared.counters.rejected.fetch_add(1, Ordering::Relaxed);
                debug!(reason = %err, "task rejected");
                Err(self.rejection(&err))
            }
        }
    }

    fn submit_bulk(&self, token: Option<&ProducerToken>, tasks: Vec<Task>) -> bool {
        let count = tasks.len() as u64;
        let queue = &self.shared.queue;
        if !self.accepts(token) {
            self.shared.counters.rejected.fetch_add(count, Ordering::Relaxed);
            debug!(count, "bulk submission rejected: foreign producer token");
            return false;
        }
        let outcome = match token {
            Some(token) => queue.enqueue_bulk_with(token, tasks),
            None => queue.enqueue_bulk(tasks),
        };

        match outcome {
            Ok(()) => {
                self.shared.counters.scheduled.fetch_add(count, Ordering::Relaxed);
                true
            }
            Err(err) => {
                self.shared.counters.rejected.fetch_add(count, Ordering::Relaxed);
                debug!(reason = %err, count, "bulk submission rejected");
                false
            }
        }
    }

    fn accepts(&self, token: Option<&ProducerToken>) -> bool {
        token.map_or(true, |token| self.shared.queue.owns(token))
    }

    fn rejection<T>(&self, err: &EnqueueError<T>) -> ScheduleError {
        match err {
            EnqueueError::Full(_) => {
                ScheduleError::QueueFull(self.shared.queue.capacity().unwrap_or(0))
            }
            EnqueueError::Closed(_) => ScheduleError::ShutDown,
        }
    }
}

impl fmt::Debug for PoolHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolHandle")
            .field("queue", &self.shared.queue)
            .field("stopped", &self.is_stopped())
            .finish()
    }
}

/// Fixed-size pool of worker threads
///
/// Dropping the pool stops it and joins every worker.
pub struct ThreadPool {
    /// Submission handle sharing the pool state
    handle: PoolHandle,

    /// Worker threads
    workers: Mutex<Vec<Worker>>,

    /// OS thread ids of the workers, fixed at construction
    worker_threads: Vec<ThreadId>,
}

impl ThreadPool {
    /// Create a pool with `workers` threads and default tuning
    ///
    /// A worker count of 0 selects the default (available parallelism + 1).
    pub fn new(workers: usize) -> Result<Self, PoolError> {
        Self::with_config(PoolConfig::default().with_workers(workers))
    }

    /// Create a pool from an explicit configuration
    pub fn with_config(config: PoolConfig) -> Result<Self, PoolError> {
        config.validate()?;

        let shared = Arc::new(PoolShared::new(config));
        let worker_count = shared.config.workers;
        let mut workers = Vec::with_capacity(worker_count);

        for id in 0..worker_count {
            let mut worker = Worker::new(id);
            if let Err(err) = worker.start(shared.clone()) {
                // Unwind the partially started pool before reporting
                shared.begin_shutdown();
                for started in &mut workers {
                    let _ = Worker::join(started);
                }
                return Err(PoolError::Spawn(err));
            }
            workers.push(worker);
        }

        info!(
            workers = worker_count,
            batch_size = shared.config.batch_size,
            timeout_ms = shared.config.dequeue_timeout.as_millis() as u64,
            policy = ?shared.config.shutdown_policy,
            "thread pool started"
        );

        let worker_threads = workers.iter().filter_map(Worker::thread_id).collect();

        Ok(Self {
            handle: PoolHandle { shared },
            workers: Mutex::new(workers),
            worker_threads,
        })
    }

    /// Get a cloneable submission handle
    pub fn handle(&self) -> PoolHandle {
        self.handle.clone()
    }

    /// See [`PoolHandle::schedule`]
    pub fn schedule<F, R>(&self, f: F) -> Result<ResultChannel<R>, ScheduleError>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        self.handle.schedule(f)
    }

    /// See [`PoolHandle::schedule_with`]
    pub fn schedule_with<F, A, R>(&self, f: F, args: A) -> Result<ResultChannel<R>, ScheduleError>
    where
        F: FnOnce(A) -> R + Send + 'static,
        A: Send + 'static,
        R: Send + 'static,
    {
        self.handle.schedule_with(f, args)
    }

    /// See [`PoolHandle::schedule_with_token`]
    pub fn schedule_with_token<F, R>(
        &self,
        token: &ProducerToken,
        f: F,
    ) -> Result<ResultChannel<R>, ScheduleError>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        self.handle.schedule_with_token(token, f)
    }

    /// See [`PoolHandle::schedule_and_forget`]
    pub fn schedule_and_forget<F, R>(&self, f: F) -> bool
    where
        F: FnOnce() -> R + Send + 'static,
    {
        self.handle.schedule_and_forget(f)
    }

    /// See [`PoolHandle::schedule_and_forget_with_token`]
    pub fn schedule_and_forget_with_token<F, R>(&self, token: &ProducerToken, f: F) -> bool
    where
        F: FnOnce() -> R + Send + 'static,
    {
        self.handle.schedule_and_forget_with_token(token, f)
    }

    /// See [`PoolHandle::schedule_bulk`]
    pub fn schedule_bulk<I>(&self, tasks: I) -> bool
    where
        I: IntoIterator<Item = Task>,
    {
        self.handle.schedule_bulk(tasks)
    }

    /// See [`PoolHandle::schedule_bulk_with_token`]
    pub fn schedule_bulk_with_token<I>(&self, token: &ProducerToken, tasks: I) -> bool
    where
        I: IntoIterator<Item = Task>,
    {
        self.handle.schedule_bulk_with_token(token, tasks)
    }

    /// See [`PoolHandle::producer_token`]
    pub fn producer_token(&self) -> ProducerToken {
        self.handle.producer_token()
    }

    /// See [`PoolHandle::bind`]
    pub fn bind<A, R, F>(&self, target: F) -> Callable<A, R>
    where
        F: Fn(A) -> R + Send + Sync + 'static,
        A: Send + 'static,
        R: Send + 'static,
    {
        self.handle.bind(target)
    }

    /// Stop accepting work and signal the workers to exit
    ///
    /// Idempotent. Running tasks are not interrupted. Whether queued tasks
    /// still run depends on the configured
    /// [`ShutdownPolicy`](crate::ShutdownPolicy).
    pub fn stop(&self) -> &Self {
        if self.handle.shared.begin_shutdown() {
            info!(queued = self.handle.queued(), "thread pool stopping");
        }
        self
    }

    /// Block until every worker thread has exited and been joined
    ///
    /// Only the first call performs joins; later calls return once those
    /// joins are done. Call [`stop`](Self::stop) first, otherwise the workers
    /// never exit. Tasks still queued after the joins are dropped and their
    /// result channels report [`TaskError::Abandoned`](crate::TaskError::Abandoned).
    ///
    /// Called from one of the pool's own workers, `join` logs a warning and
    /// returns immediately without joining anything.
    pub fn join(&self) -> &Self {
        if self.worker_threads.contains(&thread::current().id()) {
            warn!("join called from a worker of the same pool; ignoring it");
            return self;
        }

        let mut workers = self.workers.lock();
        for worker in workers.iter_mut() {
            // Teardown must not fail loudly; report through the log instead
            if let Err(payload) = worker.join() {
                error!(
                    worker = worker.id(),
                    panic = %panic_message(payload.as_ref()),
                    "worker thread terminated abnormally"
                );
            }
        }
        drop(workers);

        self.abandon_queued();
        self
    }

    /// Number of worker threads
    pub fn worker_count(&self) -> usize {
        self.handle.shared.config.workers
    }

    /// Pool configuration
    pub fn config(&self) -> &PoolConfig {
        &self.handle.shared.config
    }

    /// See [`PoolHandle::is_stopped`]
    pub fn is_stopped(&self) -> bool {
        self.handle.is_stopped()
    }

    /// See [`PoolHandle::queued`]
    pub fn queued(&self) -> usize {
        self.handle.queued()
    }

    /// See [`PoolHandle::stats`]
    pub fn stats(&self) -> PoolStats {
        self.handle.stats()
    }

    fn abandon_queued(&self) {
        let shared = &self.handle.shared;
        let leftover = shared.queue.drain();
        if leftover.is_empty() {
            return;
        }

        let count = leftover.len();
        shared
            .counters
            .abandoned
            .fetch_add(count as u64, Ordering::Relaxed);
        warn!(count, "dropping tasks left in the queue at shutdown");
        drop(leftover);
    }
}

impl fmt::Debug for ThreadPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThreadPool")
            .field("workers", &self.worker_count())
            .field("handle", &self.handle)
            .finish()
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        self.stop().join();
    }
}
