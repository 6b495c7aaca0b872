//! Bounded task queue.
//!
//! A fixed pool of worker threads draining one FIFO queue with a capacity
//! limit. Submitting work hands back an [`AsyncResult`] that settles with
//! the callable's value, its panic, or the information that it never ran.
//!
//! When the queue is full, [`enqueue`] blocks the submitter until a worker
//! frees a slot, so producers cannot outrun the pool without noticing.
//! Use [`enqueue_async`] when the submitting thread must never block.
//!
//! [`AsyncResult`]: struct.AsyncResult.html
//! [`enqueue`]: struct.TaskQueue.html#method.enqueue
//! [`enqueue_async`]: struct.TaskQueue.html#method.enqueue_async
//!
//! # Example
//!
//! ```rust
//! use antri::TaskQueue;
//!
//! let queue = TaskQueue::with_threads(2);
//!
//! let result = queue.enqueue(|| 6 * 7).unwrap();
//!
//! assert_eq!(result.get(), Ok(42));
//! ```

mod queue;
mod result;
mod task;

pub use queue::{EnqueueError, TaskQueue};
pub use result::{channel, AsyncResult, ResultSink, TaskError};
