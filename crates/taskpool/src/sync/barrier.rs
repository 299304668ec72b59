//! Countdown barrier
//!
//! One-shot: created with the number of expected completions, counted down by
//! `notify()`, waited on until it reaches zero. There is no reset.

use crate::error::BarrierError;
use parking_lot::{Condvar, Mutex};
use std::time::{Duration, Instant};

/// Counting completion barrier
#[derive(Debug)]
pub struct CountdownBarrier {
    remaining: Mutex<usize>,
    zero: Condvar,
    expected: usize,
}

impl CountdownBarrier {
    /// Create a barrier expecting `count` completions
    pub fn new(count: usize) -> Self {
        Self {
            remaining: Mutex::new(count),
            zero: Condvar::new(),
            expected: count,
        }
    }

    /// Record one completion and return how many are still expected
    ///
    /// Reaching zero wakes every waiter. Notifying a barrier that is already
    /// at zero is an error and leaves it at zero.
    pub fn notify(&self) -> Result<usize, BarrierError> {
        let mut remaining = self.remaining.lock();
        if *remaining == 0 {
            return Err(BarrierError::Overcounted {
                expected: self.expected,
            });
        }
        *remaining -= 1;
        let left = *remaining;
        drop(remaining);

        if left == 0 {
            self.zero.notify_all();
        }
        Ok(left)
    }

    /// Block until the count reaches zero
    pub fn wait(&self) {
        let mut remaining = self.remaining.lock();
        while *remaining > 0 {
            self.zero.wait(&mut remaining);
        }
    }

    /// Block until the count reaches zero or `timeout` elapses
    ///
    /// Returns `true` if the count reached zero.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now().checked_add(timeout);
        let mut remaining = self.remaining.lock();
        while *remaining > 0 {
            match deadline {
                Some(deadline) => {
                    if self.zero.wait_until(&mut remaining, deadline).timed_out() {
                        return *remaining == 0;
                    }
                }
                None => self.zero.wait(&mut remaining),
            }
        }
        true
    }

    /// Completions still expected
    pub fn remaining(&self) -> usize {
        *self.remaining.lock()
    }

    /// Completions the barrier was created with
    pub fn expected(&self) -> usize {
        self.expected
    }
}
