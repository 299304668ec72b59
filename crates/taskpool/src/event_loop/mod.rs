//! Typed single-purpose dispatch loop
//!
//! A simpler alternative to the thread pool: one payload type, one consumer
//! function, a bounded collection with soft-completion draining.

mod collection;
mod dispatch;

pub use collection::BlockingCollection;
pub use dispatch::{EventLoop, EventLoopConfig, DEFAULT_EVENT_LOOP_CAPACITY};
