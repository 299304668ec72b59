//! Callable binder
//!
//! Pairs a target function with a pool so it can be invoked like an ordinary
//! function while every call is dispatched to the pool.
//!
//! The argument type is an explicit generic parameter. Several arguments are
//! passed as a tuple:
//!
//! ```rust,ignore
//! let sum = taskpool::bind::<(i32, f64), _, _>(&pool, |(a, b)| a as f64 + b);
//! let channel = sum.call((1, 2.0))?;
//! ```
//!
//! If the argument type can be inferred neither from the target nor from the
//! turbofish, the binding does not compile.

use crate::error::ScheduleError;
use crate::scheduler::pool::{PoolHandle, ThreadPool};
use crate::scheduler::result::ResultChannel;
use std::fmt;
use std::sync::Arc;

/// Proxy dispatching calls of a bound target to a pool
///
/// Immutable and cheap to clone. Holds no execution state: each call performs
/// one fresh submission and returns one fresh result channel.
pub struct Callable<A, R> {
    pool: PoolHandle,
    target: Arc<dyn Fn(A) -> R + Send + Sync>,
}

impl<A, R> Callable<A, R>
where
    A: Send + 'static,
    R: Send + 'static,
{
    /// Bind `target` to the pool behind `pool`; schedules nothing
    pub fn new<F>(pool: PoolHandle, target: F) -> Self
    where
        F: Fn(A) -> R + Send + Sync + 'static,
    {
        Self {
            pool,
            target: Arc::new(target),
        }
    }

    /// Schedule `target(args)` on the bound pool
    pub fn call(&self, args: A) -> Result<ResultChannel<R>, ScheduleError> {
        let target = self.target.clone();
        self.pool.schedule(move || target(args))
    }

    /// Schedule `target(args)` without a result channel
    pub fn call_and_forget(&self, args: A) -> bool {
        let target = self.target.clone();
        self.pool.schedule_and_forget(move || target(args))
    }

    /// The pool this proxy dispatches to
    pub fn pool(&self) -> &PoolHandle {
        &self.pool
    }
}

impl<A, R> Clone for Callable<A, R> {
    fn clone(&self) -> Self {
        Self {
            pool: self.pool.clone(),
            target: self.target.clone(),
        }
    }
}

impl<A, R> fmt::Debug for Callable<A, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callable")
            .field("pool", &self.pool)
            .finish_non_exhaustive()
    }
}

/// Bind `target` to `pool`, returning a reusable proxy
pub fn bind<A, R, F>(pool: &ThreadPool, target: F) -> Callable<A, R>
where
    F: Fn(A) -> R + Send + Sync + 'static,
    A: Send + 'static,
    R: Send + 'static,
{
    Callable::new(pool.handle(), target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PoolConfig;
    use crate::error::TaskError;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn create_pool() -> ThreadPool {
        ThreadPool::with_config(
            PoolConfig::default()
                .with_workers(2)
                .with_dequeue_timeout(Duration::from_millis(50)),
        )
        .unwrap()
    }

    fn static_int_function(value: i32) -> i32 {
        value * 2
    }

    #[test]
    fn test_bind_function_pointer() {
        let pool = create_pool();
        let double = bind(&pool, static_int_function);
        assert_eq!(double.call(21).unwrap().wait(), Ok(42));
    }

    #[test]
    fn test_bind_does_not_schedule() {
        let pool = create_pool();
        let calls = Arc::new(AtomicUsize::new(0));
        let counted = {
            let calls = calls.clone();
            pool.bind(move |()| calls.fetch_add(1, Ordering::SeqCst))
        };

        pool.stop().join();
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(pool.stats().scheduled, 0);
        assert_eq!(counted.call(()).unwrap_err(), ScheduleError::ShutDown);
    }

    #[test]
    fn test_bind_explicit_tuple_arguments() {
        let pool = create_pool();
        let sum = bind::<(i32, f64), _, _>(&pool, |(a, b)| (a as f64 + b) as i32);
        assert_eq!(sum.call((1, 2.0)).unwrap().wait(), Ok(3));
    }

    #[test]
    fn test_bind_borrowing_lambda_state() {
        let pool = create_pool();
        let expected = Arc::new("hello_local_lambda".to_string());
        let length = {
            let expected = expected.clone();
            pool.bind(move |input: String| {
                assert_eq!(&input, expected.as_str());
                input.len()
            })
        };

        let result = length.call(expected.to_string()).unwrap().wait();
        assert_eq!(result, Ok(expected.len()));
    }

    #[test]
    fn test_each_call_is_independent() {
        let pool = create_pool();
        let square = pool.bind(|x: u64| x * x);
        let channels: Vec<_> = (0..10).map(|i| square.call(i).unwrap()).collect();
        let results: Vec<u64> = channels.into_iter().map(|c| c.wait().unwrap()).collect();
        assert_eq!(results, (0..10).map(|i| i * i).collect::<Vec<_>>());
    }

    #[test]
    fn test_clone_shares_target() {
        let pool = create_pool();
        let echo = pool.bind(|s: &'static str| s);
        let copy = echo.clone();
        assert_eq!(copy.call("copy").unwrap().wait(), Ok("copy"));
        assert_eq!(echo.call("orig").unwrap().wait(), Ok("orig"));
    }

    #[test]
    fn test_call_propagates_panic() {
        let pool = create_pool();
        let checked = pool.bind(|x: i32| {
            if x < 0 {
                panic!("negative input");
            }
            x
        });
        assert_eq!(
            checked.call(-1).unwrap().wait(),
            Err(TaskError::Panicked("negative input".to_string()))
        );
        assert_eq!(checked.call(5).unwrap().wait(), Ok(5));
    }

    #[test]
    fn test_call_and_forget() {
        let pool = create_pool();
        let calls = Arc::new(AtomicUsize::new(0));
        let counted = {
            let calls = calls.clone();
            pool.bind(move |n: usize| {
                calls.fetch_add(n, Ordering::SeqCst);
            })
        };
        assert!(counted.call_and_forget(3));
        assert!(counted.call_and_forget(4));
        pool.stop().join();
        assert_eq!(calls.load(Ordering::SeqCst), 7);
    }
}
