//! Pool configuration
//!
//! Tuning parameters are fixed at construction. Larger batches amortize queue
//! synchronization per task at the cost of coarser load balancing across
//! workers; longer dequeue timeouts reduce idle wakeups at the cost of slower
//! shutdown response.

use crate::error::ConfigError;
use std::time::Duration;

/// Batch size hint for lightweight processing of tasks within a worker
pub const BATCH_LIGHT: usize = 10;

/// Batch size hint for sparse processing of tasks within a worker
pub const BATCH_SPARSE: usize = 100;

/// Batch size hint for balanced processing of tasks within a worker
pub const BATCH_BALANCED: usize = 250;

/// Batch size hint for heavy processing of tasks within a worker
pub const BATCH_HEAVY: usize = 500;

/// Batch size hint for heavier processing of tasks within a worker
pub const BATCH_HEAVIER: usize = 2000;

/// Default time a worker blocks waiting for a batch
pub const DEFAULT_DEQUEUE_TIMEOUT: Duration = Duration::from_millis(1000);

/// What happens to queued-but-unfetched tasks once the pool is stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShutdownPolicy {
    /// Workers keep fetching until the queue is empty, so every task accepted
    /// before `stop()` runs exactly once
    #[default]
    Drain,

    /// Workers exit after their current batch; remaining tasks are dropped at
    /// `join()` and their channels report [`TaskError::Abandoned`](crate::TaskError::Abandoned)
    Abandon,
}

/// Thread pool configuration
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Number of worker threads
    pub workers: usize,

    /// Maximum number of tasks fetched per dequeue
    pub batch_size: usize,

    /// Upper bound on how long an idle worker waits before re-checking shutdown
    pub dequeue_timeout: Duration,

    /// Maximum number of queued tasks (None = unbounded)
    pub capacity: Option<usize>,

    /// Handling of queued tasks on shutdown
    pub shutdown_policy: ShutdownPolicy,

    /// Worker thread name prefix; threads are named `<prefix>-<id>`
    pub thread_name: String,
}

impl PoolConfig {
    /// Default worker count: available hardware parallelism plus one
    pub fn default_workers() -> usize {
        num_cpus::get() + 1
    }

    /// Set the worker count (0 selects the default)
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = if workers == 0 {
            Self::default_workers()
        } else {
            workers
        };
        self
    }

    /// Set the maximum batch size per fetch
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Set the fetch timeout
    pub fn with_dequeue_timeout(mut self, timeout: Duration) -> Self {
        self.dequeue_timeout = timeout;
        self
    }

    /// Bound the task queue
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = Some(capacity);
        self
    }

    /// Select the shutdown policy
    pub fn with_shutdown_policy(mut self, policy: ShutdownPolicy) -> Self {
        self.shutdown_policy = policy;
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
        if self.batch_size == 0 {
            return Err(ConfigError::ZeroBatchSize);
        }
        if self.capacity == Some(0) {
            return Err(ConfigError::ZeroCapacity);
        }
        if self.dequeue_timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout);
        }
        Ok(())
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            workers: Self::default_workers(),
            batch_size: BATCH_HEAVY,
            dequeue_timeout: DEFAULT_DEQUEUE_TIMEOUT,
            capacity: None,
            shutdown_policy: ShutdownPolicy::Drain,
            thread_name: "taskpool-worker".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PoolConfig::default();
        assert_eq!(config.workers, num_cpus::get() + 1);
        assert_eq!(config.batch_size, BATCH_HEAVY);
        assert_eq!(config.dequeue_timeout, Duration::from_secs(1));
        assert_eq!(config.capacity, None);
        assert_eq!(config.shutdown_policy, ShutdownPolicy::Drain);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_workers_selects_default() {
        let config = PoolConfig::default().with_workers(0);
        assert_eq!(config.workers, PoolConfig::default_workers());
    }

    #[test]
    fn test_validate_rejects_zero_values() {
        let mut config = PoolConfig::default();
        config.workers = 0;
        assert_eq!(config.validate(), Err(ConfigError::ZeroWorkers));

        let config = PoolConfig::default().with_batch_size(0);
        assert_eq!(config.validate(), Err(ConfigError::ZeroBatchSize));

        let config = PoolConfig::default().with_capacity(0);
        assert_eq!(config.validate(), Err(ConfigError::ZeroCapacity));

        let config = PoolConfig::default().with_dequeue_timeout(Duration::ZERO);
        assert_eq!(config.validate(), Err(ConfigError::ZeroTimeout));
    }

    #[test]
    fn test_batch_tiers_are_ordered() {
        assert!(BATCH_LIGHT < BATCH_SPARSE);
        assert!(BATCH_SPARSE < BATCH_BALANCED);
        assert!(BATCH_BALANCED < BATCH_HEAVY);
        assert!(BATCH_HEAVY < BATCH_HEAVIER);
    }
}
