//! Bounded blocking queue.
//!
//! A producer/consumer FIFO with a fixed capacity: [`push`] blocks while the
//! queue is full, [`pop`] blocks while it is empty, so a slow consumer exerts
//! backpressure on its producers instead of letting the queue grow without
//! bound.
//!
//! [`close`] wakes everyone still blocked, after that pushing fails and
//! popping drains what is left before failing.
//!
//! [`push`]: struct.BlockingQueue.html#method.push
//! [`pop`]: struct.BlockingQueue.html#method.pop
//! [`close`]: struct.BlockingQueue.html#method.close

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

use thiserror::Error;

/// Error returned by [`push`] when the queue is closed.
///
/// Gives the rejected element back to the caller.
///
/// [`push`]: struct.BlockingQueue.html#method.push
#[derive(Error)]
#[error("pushing into a closed queue")]
pub struct PushError<T>(pub T);

impl<T> fmt::Debug for PushError<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("PushError(..)")
    }
}

/// Error returned by [`pop`] when the queue is closed and drained.
///
/// [`pop`]: struct.BlockingQueue.html#method.pop
#[derive(Debug, PartialEq, Eq, Error)]
#[error("popping from a closed and empty queue")]
pub struct PopError;

/// Error returned by the timed pop variants.
#[derive(Debug, PartialEq, Eq, Error)]
pub enum PopTimeoutError {
    /// Nothing arrived before the deadline.
    #[error("pop timed out")]
    Timeout,
    /// The queue is closed and drained, nothing will ever arrive.
    #[error("popping from a closed and empty queue")]
    Closed,
}

struct Inner<T> {
    items: VecDeque<T>,
    closed: bool,
}

/// A bounded blocking FIFO queue.
///
/// All operations are serialized by one internal lock, waiting producers and
/// consumers sleep on separate condvars so a push only ever wakes a popper
/// and vice versa.
///
/// # Example
///
/// ```rust
/// use antri_blocking_queue::BlockingQueue;
///
/// let queue = BlockingQueue::with_capacity(2);
/// queue.push(1).unwrap();
/// queue.push(2).unwrap();
/// assert_eq!(queue.pop(), Ok(1));
/// assert_eq!(queue.pop(), Ok(2));
/// ```
pub struct BlockingQueue<T> {
    capacity: usize,
    inner: Mutex<Inner<T>>,
    not_empty: Condvar,
    not_full: Condvar,
}

impl<T> BlockingQueue<T> {
    /// Returns a new queue with no practical capacity limit.
    pub fn new() -> BlockingQueue<T> {
        BlockingQueue::with_capacity(usize::MAX)
    }

    /// Returns a new queue holding at most `capacity` elements.
    ///
    /// # Panics
    ///
    /// When `capacity` is zero, such a queue could never hold an element.
    pub fn with_capacity(capacity: usize) -> BlockingQueue<T> {
        assert!(capacity >= 1, "queue capacity must be at least 1");

        BlockingQueue {
            capacity,
            inner: Mutex::new(Inner {
                items: VecDeque::new(),
                closed: false,
            }),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
        }
    }

    /// Append `value` at the tail, blocking while the queue is full.
    ///
    /// Fails only when the queue is closed, handing `value` back.
    pub fn push(&self, value: T) -> Result<(), PushError<T>> {
        let mut inner = self.inner.lock().unwrap();

        loop {
            if inner.closed {
                return Err(PushError(value));
            }
            if inner.items.len() < self.capacity {
                break;
            }
            inner = self.not_full.wait(inner).unwrap();
        }

        inner.items.push_back(value);
        self.not_empty.notify_one();
        Ok(())
    }

    /// Remove and return the head, blocking while the queue is empty.
    ///
    /// A closed queue still yields its remaining elements, the error only
    /// shows up once it is drained.
    pub fn pop(&self) -> Result<T, PopError> {
        let mut inner = self.inner.lock().unwrap();

        loop {
            if let Some(value) = inner.items.pop_front() {
                self.not_full.notify_one();
                return Ok(value);
            }
            if inner.closed {
                return Err(PopError);
            }
            inner = self.not_empty.wait(inner).unwrap();
        }
    }

    /// As [`pop`], but gives up once `deadline` passes.
    ///
    /// [`pop`]: struct.BlockingQueue.html#method.pop
    pub fn pop_deadline(&self, deadline: Instant) -> Result<T, PopTimeoutError> {
        let mut inner = self.inner.lock().unwrap();

        loop {
            if let Some(value) = inner.items.pop_front() {
                self.not_full.notify_one();
                return Ok(value);
            }
            if inner.closed {
                return Err(PopTimeoutError::Closed);
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(PopTimeoutError::Timeout);
            }

            let (guard, _) = self.not_empty.wait_timeout(inner, deadline - now).unwrap();
            inner = guard;
        }
    }

    /// As [`pop`], but gives up after `timeout`.
    ///
    /// [`pop`]: struct.BlockingQueue.html#method.pop
    pub fn pop_timeout(&self, timeout: Duration) -> Result<T, PopTimeoutError> {
        match Instant::now().checked_add(timeout) {
            Some(deadline) => self.pop_deadline(deadline),
            // so far in the future that it is effectively forever
            None => self.pop().map_err(|_| PopTimeoutError::Closed),
        }
    }

    /// Close the queue and wake every blocked producer and consumer.
    ///
    /// Closing twice is fine.
    pub fn close(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.closed = true;
        self.not_empty.notify_all();
        self.not_full.notify_all();
    }

    /// Is closed ?
    pub fn is_closed(&self) -> bool {
        self.inner.lock().unwrap().closed
    }

    /// Number of elements currently queued.
    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().items.len()
    }

    /// Is empty ?
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Maximum number of elements the queue can hold.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl<T> Default for BlockingQueue<T> {
    fn default() -> BlockingQueue<T> {
        BlockingQueue::new()
    }
}

impl<T> fmt::Debug for BlockingQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let inner = self.inner.lock().unwrap();
        f.debug_struct("BlockingQueue")
            .field("len", &inner.items.len())
            .field("capacity", &self.capacity)
            .field("closed", &inner.closed)
            .finish()
    }
}
