//! One-shot result channel
//!
//! A [`Promise`] is written at most once by the worker running the task; the
//! paired [`ResultChannel`] is read by the submitter. Dropping the promise
//! without writing it breaks the channel, which readers observe as
//! [`TaskError::Abandoned`] instead of blocking forever.

use crate::error::TaskError;
use crate::scheduler::task::panic_message;
use parking_lot::{Condvar, Mutex};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};

enum Slot<R> {
    Pending,
    Ready(Result<R, TaskError>),
    Abandoned,
    Taken,
}

struct Shared<R> {
    slot: Mutex<Slot<R>>,
    ready: Condvar,
}

/// Create a connected promise/channel pair
pub fn channel<R>() -> (Promise<R>, ResultChannel<R>) {
    let shared = Arc::new(Shared {
        slot: Mutex::new(Slot::Pending),
        ready: Condvar::new(),
    });
    (
        Promise {
            shared: Some(shared.clone()),
        },
        ResultChannel { shared },
    )
}

/// Producer side of a result channel
pub struct Promise<R> {
    shared: Option<Arc<Shared<R>>>,
}

impl<R> Promise<R> {
    /// Store the task's value
    pub fn fulfill(mut self, value: R) {
        self.settle(Ok(value));
    }

    /// Store a failure
    pub fn fail(mut self, error: TaskError) {
        self.settle(Err(error));
    }

    /// Run `f` and store its value, or the panic it raised
    pub fn complete_with<F>(self, f: F)
    where
        F: FnOnce() -> R,
    {
        match panic::catch_unwind(AssertUnwindSafe(f)) {
            Ok(value) => self.fulfill(value),
            Err(payload) => self.fail(TaskError::Panicked(panic_message(payload.as_ref()))),
        }
    }

    fn settle(&mut self, outcome: Result<R, TaskError>) {
        if let Some(shared) = self.shared.take() {
            *shared.slot.lock() = Slot::Ready(outcome);
            shared.ready.notify_all();
        }
    }
}

impl<R> Drop for Promise<R> {
    fn drop(&mut self) {
        if let Some(shared) = self.shared.take() {
            let mut slot = shared.slot.lock();
            if matches!(*slot, Slot::Pending) {
                *slot = Slot::Abandoned;
            }
            drop(slot);
            shared.ready.notify_all();
        }
    }
}

impl<R> fmt::Debug for Promise<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Promise")
            .field("settled", &self.shared.is_none())
            .finish()
    }
}

/// Consumer side of a result channel
pub struct ResultChannel<R> {
    shared: Arc<Shared<R>>,
}

impl<R> ResultChannel<R> {
    /// Block until the task finishes and return its outcome
    pub fn wait(self) -> Result<R, TaskError> {
        let mut slot = self.shared.slot.lock();
        loop {
            if let Some(outcome) = take_outcome(&mut slot) {
                return outcome;
            }
            self.shared.ready.wait(&mut slot);
        }
    }

    /// Block for at most `timeout`
    ///
    /// Returns `Ok(None)` if the task has not finished in time; the channel
    /// can be read again later.
    pub fn wait_timeout(&mut self, timeout: Duration) -> Result<Option<R>, TaskError> {
        let deadline = Instant::now().checked_add(timeout);
        let mut slot = self.shared.slot.lock();
        loop {
            if let Some(outcome) = take_outcome(&mut slot) {
                return outcome.map(Some);
            }
            match deadline {
                Some(deadline) => {
                    if self.shared.ready.wait_until(&mut slot, deadline).timed_out() {
                        return take_outcome(&mut slot).transpose();
                    }
                }
                None => self.shared.ready.wait(&mut slot),
            }
        }
    }

    /// Take the outcome if it is available, without blocking
    pub fn try_take(&mut self) -> Result<Option<R>, TaskError> {
        let mut slot = self.shared.slot.lock();
        take_outcome(&mut slot).transpose()
    }

    /// Whether reading the channel would return without blocking
    pub fn is_ready(&self) -> bool {
        !matches!(*self.shared.slot.lock(), Slot::Pending)
    }
}

impl<R> fmt::Debug for ResultChannel<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResultChannel")
            .field("ready", &self.is_ready())
            .finish()
    }
}

/// Move the outcome out of a settled slot; `None` while still pending
fn take_outcome<R>(slot: &mut Slot<R>) -> Option<Result<R, TaskError>> {
    match std::mem::replace(slot, Slot::Taken) {
        Slot::Pending => {
            *slot = Slot::Pending;
            None
        }
        Slot::Ready(outcome) => Some(outcome),
        Slot::Abandoned => {
            *slot = Slot::Abandoned;
            Some(Err(TaskError::Abandoned))
        }
        Slot::Taken => Some(Err(TaskError::AlreadyRetrieved)),
    }
}
