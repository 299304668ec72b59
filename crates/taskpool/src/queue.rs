//! Task queue shared by producers and workers
//!
//! A multi-producer/multi-consumer FIFO, optionally bounded, supporting single
//! and bulk enqueue, timed bulk dequeue, and per-thread affinity tokens. Bulk
//! enqueue is all-or-nothing: a batch is admitted as one contiguous run or not
//! at all. Closing the queue rejects further enqueues and wakes every waiting
//! consumer; items already queued stay available until dequeued or drained.

use parking_lot::{Condvar, Mutex};
use std::cell::Cell;
use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

static NEXT_QUEUE_ID: AtomicU64 = AtomicU64::new(1);

/// Error returned when the queue refuses an item; hands the item back
#[derive(PartialEq, Eq, Clone, Copy)]
pub enum EnqueueError<T> {
    /// The queue is bounded and has no room
    Full(T),

    /// The queue has been closed
    Closed(T),
}

impl<T> EnqueueError<T> {
    /// Recover the rejected item (or batch)
    pub fn into_inner(self) -> T {
        match self {
            EnqueueError::Full(item) | EnqueueError::Closed(item) => item,
        }
    }

    /// Whether the rejection was caused by closing the queue
    pub fn is_closed(&self) -> bool {
        matches!(self, EnqueueError::Closed(_))
    }
}

impl<T> fmt::Debug for EnqueueError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EnqueueError::Full(_) => f.write_str("Full(..)"),
            EnqueueError::Closed(_) => f.write_str("Closed(..)"),
        }
    }
}

impl<T> fmt::Display for EnqueueError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EnqueueError::Full(_) => f.write_str("enqueueing into a full queue"),
            EnqueueError::Closed(_) => f.write_str("enqueueing into a closed queue"),
        }
    }
}

impl<T> std::error::Error for EnqueueError<T> {}

/// Producer-side affinity token
///
/// Bound to one queue instance and meant to be reused by a single thread
/// (`Send` but not `Sync`). Tracks how many items went through it.
pub struct ProducerToken {
    queue_id: u64,
    enqueued: Cell<u64>,
}

impl ProducerToken {
    /// Number of items admitted through this token
    pub fn enqueued(&self) -> u64 {
        self.enqueued.get()
    }

    fn record(&self, count: usize) {
        self.enqueued.set(self.enqueued.get() + count as u64);
    }
}

impl fmt::Debug for ProducerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProducerToken")
            .field("queue_id", &self.queue_id)
            .field("enqueued", &self.enqueued.get())
            .finish()
    }
}

/// Consumer-side affinity token
///
/// Bound to one queue instance and meant to be reused by a single thread.
pub struct ConsumerToken {
    queue_id: u64,
    dequeued: Cell<u64>,
}

impl ConsumerToken {
    /// Number of items fetched through this token
    pub fn dequeued(&self) -> u64 {
        self.dequeued.get()
    }
}

impl fmt::Debug for ConsumerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConsumerToken")
            .field("queue_id", &self.queue_id)
            .field("dequeued", &self.dequeued.get())
            .finish()
    }
}

struct QueueState<T> {
    items: VecDeque<T>,
    closed: bool,
}

/// Blocking MPMC task queue
pub struct TaskQueue<T> {
    id: u64,
    state: Mutex<QueueState<T>>,
    /// Signalled when items arrive or the queue closes
    not_empty: Condvar,
    capacity: Option<usize>,
}

impl<T> TaskQueue<T> {
    /// Create an unbounded queue
    pub fn unbounded() -> Self {
        Self::with_capacity(None)
    }

    /// Create a queue holding at most `capacity` items
    pub fn bounded(capacity: usize) -> Self {
        Self::with_capacity(Some(capacity))
    }

    /// Create a queue with an optional bound
    pub fn with_capacity(capacity: Option<usize>) -> Self {
        Self {
            id: NEXT_QUEUE_ID.fetch_add(1, Ordering::Relaxed),
            state: Mutex::new(QueueState {
                items: VecDeque::new(),
                closed: false,
            }),
            not_empty: Condvar::new(),
            capacity,
        }
    }

    /// Create a producer token bound to this queue
    pub fn producer_token(&self) -> ProducerToken {
        ProducerToken {
            queue_id: self.id,
            enqueued: Cell::new(0),
        }
    }

    /// Whether `token` was created by this queue
    pub fn owns(&self, token: &ProducerToken) -> bool {
        token.queue_id == self.id
    }

    /// Create a consumer token bound to this queue
    pub fn consumer_token(&self) -> ConsumerToken {
        ConsumerToken {
            queue_id: self.id,
            dequeued: Cell::new(0),
        }
    }

    /// Enqueue one item
    pub fn enqueue(&self, item: T) -> Result<(), EnqueueError<T>> {
        {
            let mut state = self.state.lock();
            if state.closed {
                return Err(EnqueueError::Closed(item));
            }
            if self.is_full(state.items.len(), 1) {
                return Err(EnqueueError::Full(item));
            }
            state.items.push_back(item);
        }
        self.not_empty.notify_one();
        Ok(())
    }

    /// Enqueue one item through a producer token
    ///
    /// # Panics
    ///
    /// Panics if the token was created by a different queue.
    pub fn enqueue_with(&self, token: &ProducerToken, item: T) -> Result<(), EnqueueError<T>> {
        self.check_token(token.queue_id);
        self.enqueue(item)?;
        token.record(1);
        Ok(())
    }

    /// Enqueue a batch; either every item is admitted or none is
    pub fn enqueue_bulk(&self, items: Vec<T>) -> Result<(), EnqueueError<Vec<T>>> {
        let count = items.len();
        {
            let mut state = self.state.lock();
            if state.closed {
                return Err(EnqueueError::Closed(items));
            }
            if self.is_full(state.items.len(), count) {
                return Err(EnqueueError::Full(items));
            }
            state.items.extend(items);
        }
        match count {
            0 => {}
            1 => {
                self.not_empty.notify_one();
            }
            _ => {
                self.not_empty.notify_all();
            }
        }
        Ok(())
    }

    /// Enqueue a batch through a producer token
    ///
    /// # Panics
    ///
    /// Panics if the token was created by a different queue.
    pub fn enqueue_bulk_with(
        &self,
        token: &ProducerToken,
        items: Vec<T>,
    ) -> Result<(), EnqueueError<Vec<T>>> {
        self.check_token(token.queue_id);
        let count = items.len();
        self.enqueue_bulk(items)?;
        token.record(count);
        Ok(())
    }

    /// Wait up to `timeout` for items, then move up to `max` of them into `out`
    ///
    /// Returns the number of items fetched: 0 on timeout, or immediately when
    /// the queue is closed and empty.
    ///
    /// # Panics
    ///
    /// Panics if the token was created by a different queue.
    pub fn wait_dequeue_bulk_timed(
        &self,
        token: &ConsumerToken,
        out: &mut Vec<T>,
        max: usize,
        timeout: Duration,
    ) -> usize {
        self.check_token(token.queue_id);
        if max == 0 {
            return 0;
        }

        // A timeout too large to represent waits without a deadline
        let deadline = Instant::now().checked_add(timeout);

        let mut state = self.state.lock();
        while state.items.is_empty() && !state.closed {
            match deadline {
                Some(deadline) => {
                    if self.not_empty.wait_until(&mut state, deadline).timed_out() {
                        break;
                    }
                }
                None => self.not_empty.wait(&mut state),
            }
        }

        let fetched = max.min(state.items.len());
        out.extend(state.items.drain(..fetched));
        let leftover = !state.items.is_empty();
        drop(state);

        // Pass the wakeup on if this batch did not take everything
        if leftover && fetched > 0 {
            self.not_empty.notify_one();
        }

        token.dequeued.set(token.dequeued.get() + fetched as u64);
        fetched
    }

    /// Non-blocking single fetch
    pub fn try_dequeue(&self) -> Option<T> {
        self.state.lock().items.pop_front()
    }

    /// Reject all further enqueues and wake every waiting consumer
    ///
    /// Returns `true` if this call closed the queue.
    pub fn close(&self) -> bool {
        let newly_closed = {
            let mut state = self.state.lock();
            !std::mem::replace(&mut state.closed, true)
        };
        self.not_empty.notify_all();
        newly_closed
    }

    /// Whether the queue has been closed
    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    /// Remove and return every queued item
    pub fn drain(&self) -> Vec<T> {
        self.state.lock().items.drain(..).collect()
    }

    /// Number of queued items
    pub fn len(&self) -> usize {
        self.state.lock().items.len()
    }

    /// Whether no items are queued
    pub fn is_empty(&self) -> bool {
        self.state.lock().items.is_empty()
    }

    /// Queue bound, if any
    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    fn is_full(&self, queued: usize, incoming: usize) -> bool {
        match self.capacity {
            Some(capacity) => queued + incoming > capacity,
            None => false,
        }
    }

    fn check_token(&self, queue_id: u64) {
        assert_eq!(
            queue_id, self.id,
            "affinity token used with a queue it was not created for"
        );
    }
}

impl<T> Default for TaskQueue<T> {
    fn default() -> Self {
        Self::unbounded()
    }
}

impl<T> fmt::Debug for TaskQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("TaskQueue")
            .field("id", &self.id)
            .field("len", &state.items.len())
            .field("closed", &state.closed)
            .field("capacity", &self.capacity)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_enqueue_dequeue_fifo() {
        let queue = TaskQueue::unbounded();
        let token = queue.consumer_token();
        for i in 0..5 {
            queue.enqueue(i).unwrap();
        }

        let mut out = Vec::new();
        let fetched = queue.wait_dequeue_bulk_timed(&token, &mut out, 3, Duration::from_millis(10));
        assert_eq!(fetched, 3);
        assert_eq!(out, vec![0, 1, 2]);
        assert_eq!(queue.len(), 2);
        assert_eq!(token.dequeued(), 3);
    }

    #[test]
    fn test_timed_dequeue_times_out() {
        let queue: TaskQueue<u32> = TaskQueue::unbounded();
        let token = queue.consumer_token();
        let mut out = Vec::new();

        let start = Instant::now();
        let fetched =
            queue.wait_dequeue_bulk_timed(&token, &mut out, 10, Duration::from_millis(30));
        assert_eq!(fetched, 0);
        assert!(start.elapsed() >= Duration::from_millis(30));
    }

    #[test]
    fn test_bounded_rejects_when_full() {
        let queue = TaskQueue::bounded(2);
        queue.enqueue(1).unwrap();
        queue.enqueue(2).unwrap();

        match queue.enqueue(3) {
            Err(EnqueueError::Full(item)) => assert_eq!(item, 3),
            other => panic!("expected Full, got {:?}", other),
        }
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn test_bulk_is_all_or_nothing() {
        let queue = TaskQueue::bounded(4);
        queue.enqueue_bulk(vec![1, 2, 3]).unwrap();

        let rejected = queue.enqueue_bulk(vec![4, 5]).unwrap_err();
        assert!(!rejected.is_closed());
        assert_eq!(rejected.into_inner(), vec![4, 5]);

        // Nothing from the rejected batch was admitted
        assert_eq!(queue.len(), 3);
        assert_eq!(queue.drain(), vec![1, 2, 3]);
    }

    #[test]
    fn test_close_rejects_and_keeps_items() {
        let queue = TaskQueue::unbounded();
        queue.enqueue(1).unwrap();
        assert!(queue.close());
        assert!(!queue.close());

        assert!(queue.enqueue(2).unwrap_err().is_closed());
        assert!(queue.enqueue_bulk(vec![3]).unwrap_err().is_closed());
        assert_eq!(queue.try_dequeue(), Some(1));
        assert_eq!(queue.try_dequeue(), None);
    }

    #[test]
    fn test_close_wakes_waiting_consumer() {
        let queue: Arc<TaskQueue<u32>> = Arc::new(TaskQueue::unbounded());
        let consumer = {
            let queue = queue.clone();
            thread::spawn(move || {
                let token = queue.consumer_token();
                let mut out = Vec::new();
                let start = Instant::now();
                let fetched =
                    queue.wait_dequeue_bulk_timed(&token, &mut out, 10, Duration::from_secs(30));
                (fetched, start.elapsed())
            })
        };

        thread::sleep(Duration::from_millis(20));
        queue.close();

        let (fetched, waited) = consumer.join().unwrap();
        assert_eq!(fetched, 0);
        assert!(waited < Duration::from_secs(5));
    }

    #[test]
    fn test_producer_token_counts() {
        let queue = TaskQueue::unbounded();
        let token = queue.producer_token();
        queue.enqueue_with(&token, 1).unwrap();
        queue.enqueue_bulk_with(&token, vec![2, 3, 4]).unwrap();
        assert_eq!(token.enqueued(), 4);
    }

    #[test]
    fn test_owns_token() {
        let a: TaskQueue<u32> = TaskQueue::unbounded();
        let b: TaskQueue<u32> = TaskQueue::unbounded();
        let token = a.producer_token();
        assert!(a.owns(&token));
        assert!(!b.owns(&token));
    }

    #[test]
    #[should_panic(expected = "affinity token")]
    fn test_foreign_token_panics() {
        let a: TaskQueue<u32> = TaskQueue::unbounded();
        let b: TaskQueue<u32> = TaskQueue::unbounded();
        let token = a.producer_token();
        let _ = b.enqueue_with(&token, 1);
    }

    #[test]
    fn test_concurrent_producers_consumers() {
        let queue: Arc<TaskQueue<usize>> = Arc::new(TaskQueue::unbounded());
        let producers: Vec<_> = (0..4)
            .map(|p| {
                let queue = queue.clone();
                thread::spawn(move || {
                    let token = queue.producer_token();
                    for i in 0..250 {
                        queue.enqueue_with(&token, p * 1000 + i).unwrap();
                    }
                })
            })
            .collect();
        for producer in producers {
            producer.join().unwrap();
        }
        queue.close();

        let consumers: Vec<_> = (0..3)
            .map(|_| {
                let queue = queue.clone();
                thread::spawn(move || {
                    let token = queue.consumer_token();
                    let mut out = Vec::new();
                    let timeout = Duration::from_millis(50);
                    while queue.wait_dequeue_bulk_timed(&token, &mut out, 16, timeout) > 0 {}
                    out
                })
            })
            .collect();

        let mut all: Vec<usize> = consumers
            .into_iter()
            .flat_map(|c| c.join().unwrap())
            .collect();
        all.sort_unstable();
        all.dedup();
        assert_eq!(all.len(), 1000);
    }
}
