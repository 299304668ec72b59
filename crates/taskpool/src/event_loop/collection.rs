//! Bounded blocking collection with soft completion
//!
//! `add` blocks while the collection is full. `complete_adding` refuses new
//! items but keeps the queued ones; `take` keeps returning them until the
//! collection is both completed and empty.

use crate::error::PushError;
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::fmt;

struct CollectionState<T> {
    items: VecDeque<T>,
    adding_completed: bool,
}

/// Bounded FIFO shared by producers and event loop workers
pub struct BlockingCollection<T> {
    state: Mutex<CollectionState<T>>,
    not_empty: Condvar,
    not_full: Condvar,
    capacity: usize,
}

impl<T> BlockingCollection<T> {
    /// Create a collection holding at most `capacity` items
    pub fn new(capacity: usize) -> Self {
        Self {
            state: Mutex::new(CollectionState {
                items: VecDeque::with_capacity(capacity),
                adding_completed: false,
            }),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
            capacity,
        }
    }

    /// Add an item, blocking while the collection is full
    pub fn add(&self, item: T) -> Result<(), PushError<T>> {
        let mut state = self.state.lock();
        while state.items.len() >= self.capacity && !state.adding_completed {
            self.not_full.wait(&mut state);
        }
        if state.adding_completed {
            return Err(PushError::Completed(item));
        }
        state.items.push_back(item);
        drop(state);

        self.not_empty.notify_one();
        Ok(())
    }

    /// Add an item without blocking
    pub fn try_add(&self, item: T) -> Result<(), PushError<T>> {
        let mut state = self.state.lock();
        if state.adding_completed {
            return Err(PushError::Completed(item));
        }
        if state.items.len() >= self.capacity {
            return Err(PushError::Full(item));
        }
        state.items.push_back(item);
        drop(state);

        self.not_empty.notify_one();
        Ok(())
    }

    /// Take the next item, blocking while the collection is empty
    ///
    /// Returns `None` once adding is completed and no items remain.
    pub fn take(&self) -> Option<T> {
        let mut state = self.state.lock();
        loop {
            if let Some(item) = state.items.pop_front() {
                drop(state);
                self.not_full.notify_one();
                return Some(item);
            }
            if state.adding_completed {
                return None;
            }
            self.not_empty.wait(&mut state);
        }
    }

    /// Take the next item if one is queued
    pub fn try_take(&self) -> Option<T> {
        let item = self.state.lock().items.pop_front();
        if item.is_some() {
            self.not_full.notify_one();
        }
        item
    }

    /// Refuse further items and wake every blocked producer and consumer
    ///
    /// Returns `true` if this call completed the collection.
    pub fn complete_adding(&self) -> bool {
        let newly_completed = {
            let mut state = self.state.lock();
            !std::mem::replace(&mut state.adding_completed, true)
        };
        self.not_empty.notify_all();
        self.not_full.notify_all();
        newly_completed
    }

    /// Whether `complete_adding` has been called
    pub fn is_adding_completed(&self) -> bool {
        self.state.lock().adding_completed
    }

    /// Whether adding is completed and every item has been taken
    pub fn is_completed(&self) -> bool {
        let state = self.state.lock();
        state.adding_completed && state.items.is_empty()
    }

    /// Number of queued items
    pub fn len(&self) -> usize {
        self.state.lock().items.len()
    }

    /// Whether no items are queued
    pub fn is_empty(&self) -> bool {
        self.state.lock().items.is_empty()
    }

    /// Maximum number of queued items
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl<T> fmt::Debug for BlockingCollection<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("BlockingCollection")
            .field("len", &state.items.len())
            .field("capacity", &self.capacity)
            .field("adding_completed", &state.adding_completed)
            .finish()
    }
}
