use std::panic::{catch_unwind, AssertUnwindSafe};

use crate::result::ResultSink;

/// A type-erased unit of work.
///
/// `run` consumes the box, a task can never execute twice.
pub(crate) trait Runnable: Send {
    fn run(self: Box<Self>);
}

pub(crate) type Task = Box<dyn Runnable>;

struct Closure<F, R> {
    f: F,
    sink: ResultSink<R>,
}

impl<F, R> Runnable for Closure<F, R>
where
    F: FnOnce() -> R + Send,
    R: Send,
{
    fn run(self: Box<Self>) {
        let Closure { f, sink } = *self;

        // a panicking task must not take the worker thread down with it,
        // the panic travels to whoever holds the result instead
        match catch_unwind(AssertUnwindSafe(f)) {
            Ok(value) => sink.fulfill(value),
            Err(payload) => sink.fail(payload),
        }
    }
}

pub(crate) fn wrap<F, R>(f: F, sink: ResultSink<R>) -> Task
where
    F: FnOnce() -> R + Send + 'static,
    R: Send + 'static,
{
    Box::new(Closure { f, sink })
}

#[cfg(test)]
mod tests {
    use crate::result::{channel, TaskError};

    use super::wrap;

    #[test]
    fn run_delivers_the_value() {
        let (sink, result) = channel();
        let task = wrap(|| 2 + 2, sink);

        task.run();
        assert_eq!(result.get(), Ok(4));
    }

    #[test]
    fn run_captures_a_panic() {
        let (sink, result) = channel::<()>();
        let task = wrap(|| panic!("boom"), sink);

        // must not unwind out of run
        task.run();

        match result.get() {
            Err(TaskError::Panicked(message)) => assert_eq!(message, "boom"),
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[test]
    fn dropping_an_unrun_task_loses_the_result() {
        let (sink, result) = channel::<i32>();
        let task = wrap(|| 1, sink);

        drop(task);
        assert_eq!(result.get(), Err(TaskError::Lost));
    }
}
