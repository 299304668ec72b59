//! Task Scheduler
//!
//! A fixed set of worker threads consumes batches of type-erased tasks from
//! the shared queue. Submitters get a one-shot result channel per task, or
//! submit fire-and-forget and bulk work. Shutdown is cooperative.

mod callable;
mod pool;
mod result;
mod shutdown;
mod task;
mod worker;

pub use callable::{bind, Callable};
pub use pool::{PoolHandle, PoolStats, ThreadPool};
pub use result::{channel, Promise, ResultChannel};
pub use shutdown::ShutdownSignal;
pub use task::Task;

pub(crate) use task::panic_message;
