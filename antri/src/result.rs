//! One-shot result channel between a task and its submitter.

use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TryRecvError};
use thiserror::Error;

/// Why a task did not produce a value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TaskError {
    /// The task panicked while running, carries the panic message.
    #[error("task panicked: {0}")]
    Panicked(String),

    /// The task was dropped before it had a chance to run, so its result
    /// will never arrive.
    #[error("task was dropped before it could run")]
    Lost,
}

enum Outcome<T> {
    Value(T),
    Panicked(String),
}

/// Producer half of a one-shot result channel.
///
/// Written at most once: both delivery methods consume the sink, so a second
/// write does not compile. Dropping the sink unwritten makes the paired
/// [`AsyncResult`] observe [`TaskError::Lost`].
///
/// [`AsyncResult`]: struct.AsyncResult.html
/// [`TaskError::Lost`]: enum.TaskError.html#variant.Lost
pub struct ResultSink<T> {
    tx: Sender<Outcome<T>>,
}

impl<T> ResultSink<T> {
    /// Deliver the value.
    pub fn fulfill(self, value: T) {
        // the consumer may already be gone, nobody cares about the value then
        let _ = self.tx.try_send(Outcome::Value(value));
    }

    /// Deliver a captured panic.
    pub fn fail(self, payload: Box<dyn Any + Send + 'static>) {
        let _ = self.tx.try_send(Outcome::Panicked(panic_message(&*payload)));
    }
}

impl<T> fmt::Debug for ResultSink<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("ResultSink(..)")
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "opaque panic payload".to_string()
    }
}

/// Consumer half of a one-shot result channel.
///
/// The outcome settles exactly once and stays put, every read after that
/// observes the same outcome.
pub struct AsyncResult<T> {
    rx: Receiver<Outcome<T>>,
    settled: RefCell<Option<Result<T, TaskError>>>,
}

impl<T> AsyncResult<T> {
    /// Block until the producer side settles this result.
    ///
    /// Returns immediately when already settled.
    pub fn wait(&self) {
        if self.settled.borrow().is_some() {
            return;
        }

        let settled = match self.rx.recv() {
            Ok(outcome) => from_outcome(outcome),
            Err(_) => Err(TaskError::Lost),
        };
        *self.settled.borrow_mut() = Some(settled);
    }

    /// As [`wait`], but gives up once `deadline` passes.
    ///
    /// Returns whether the result is settled.
    ///
    /// [`wait`]: struct.AsyncResult.html#method.wait
    pub fn wait_until(&self, deadline: Instant) -> bool {
        if self.settled.borrow().is_some() {
            return true;
        }

        let settled = match self.rx.recv_deadline(deadline) {
            Ok(outcome) => from_outcome(outcome),
            Err(RecvTimeoutError::Timeout) => return false,
            Err(RecvTimeoutError::Disconnected) => Err(TaskError::Lost),
        };
        *self.settled.borrow_mut() = Some(settled);
        true
    }

    /// As [`wait`], but gives up after `timeout`.
    ///
    /// Returns whether the result is settled.
    ///
    /// [`wait`]: struct.AsyncResult.html#method.wait
    pub fn wait_for(&self, timeout: Duration) -> bool {
        if self.settled.borrow().is_some() {
            return true;
        }

        let settled = match self.rx.recv_timeout(timeout) {
            Ok(outcome) => from_outcome(outcome),
            Err(RecvTimeoutError::Timeout) => return false,
            Err(RecvTimeoutError::Disconnected) => Err(TaskError::Lost),
        };
        *self.settled.borrow_mut() = Some(settled);
        true
    }

    /// Is the outcome already there ? Never blocks.
    pub fn is_ready(&self) -> bool {
        if self.settled.borrow().is_some() {
            return true;
        }

        let settled = match self.rx.try_recv() {
            Ok(outcome) => from_outcome(outcome),
            Err(TryRecvError::Empty) => return false,
            Err(TryRecvError::Disconnected) => Err(TaskError::Lost),
        };
        *self.settled.borrow_mut() = Some(settled);
        true
    }

    /// Block until settled, then return the outcome.
    ///
    /// Can be called any number of times, every call observes the same
    /// outcome.
    pub fn get(&self) -> Result<T, TaskError>
    where
        T: Clone,
    {
        self.wait();
        self.settled.borrow().clone().unwrap()
    }

    /// Block until settled, then move the outcome out.
    pub fn into_result(self) -> Result<T, TaskError> {
        self.wait();
        self.settled.into_inner().unwrap()
    }
}

impl<T> fmt::Debug for AsyncResult<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("AsyncResult(..)")
    }
}

fn from_outcome<T>(outcome: Outcome<T>) -> Result<T, TaskError> {
    match outcome {
        Outcome::Value(value) => Ok(value),
        Outcome::Panicked(message) => Err(TaskError::Panicked(message)),
    }
}

/// Returns a connected [`ResultSink`] / [`AsyncResult`] pair.
///
/// [`ResultSink`]: struct.ResultSink.html
/// [`AsyncResult`]: struct.AsyncResult.html
pub fn channel<T>() -> (ResultSink<T>, AsyncResult<T>) {
    let (tx, rx) = bounded(1);
    (
        ResultSink { tx },
        AsyncResult {
            rx,
            settled: RefCell::new(None),
        },
    )
}
