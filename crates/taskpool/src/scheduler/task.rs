//! Type-erased unit of work

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};

/// A zero-argument unit of work
///
/// Every closure, whatever its captured state or result type, is stored as
/// the same boxed nullary operation so workers handle a uniform item type.
/// Arguments are captured when the task is built, not when it runs.
pub struct Task {
    body: Box<dyn FnOnce() + Send + 'static>,
}

impl Task {
    /// Wrap a closure as a task
    pub fn new<F>(f: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self { body: Box::new(f) }
    }

    /// Run the task, containing any panic raised by its body
    pub fn run(self) -> Result<(), Box<dyn Any + Send + 'static>> {
        let body = self.body;
        panic::catch_unwind(AssertUnwindSafe(body))
    }
}

impl<F> From<F> for Task
where
    F: FnOnce() + Send + 'static,
{
    fn from(f: F) -> Self {
        Task::new(f)
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Task { .. }")
    }
}

/// Extract a readable message from a panic payload
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_task_runs_once() {
        let counter = Arc::new(AtomicUsize::new(0));
        let task = {
            let counter = counter.clone();
            Task::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            })
        };

        assert!(task.run().is_ok());
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_task_captures_arguments_eagerly() {
        let mut value = 1;
        let seen = Arc::new(AtomicUsize::new(0));
        let task = {
            let seen = seen.clone();
            let captured = value;
            Task::new(move || seen.store(captured, Ordering::SeqCst))
        };
        value = 2;

        task.run().unwrap();
        assert_eq!(seen.load(Ordering::SeqCst), 1);
        assert_eq!(value, 2);
    }

    #[test]
    fn test_task_panic_is_contained() {
        let task = Task::new(|| panic!("boom"));
        let payload = task.run().unwrap_err();
        assert_eq!(panic_message(payload.as_ref()), "boom");
    }

    #[test]
    fn test_panic_message_formats() {
        let task = Task::new(|| panic!("value {}", 7));
        let payload = task.run().unwrap_err();
        assert_eq!(panic_message(payload.as_ref()), "value 7");

        let task = Task::new(|| std::panic::panic_any(42_u32));
        let payload = task.run().unwrap_err();
        assert_eq!(panic_message(payload.as_ref()), "non-string panic payload");
    }
}
