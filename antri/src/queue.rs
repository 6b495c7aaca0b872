use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use antri_blocking_queue::{BlockingQueue, PopTimeoutError};
use thiserror::Error;

#[cfg(feature = "tracing")]
use log::trace;

use crate::result::{channel, AsyncResult};
use crate::task::{self, Task};

/// How long a worker sleeps in a timed pop before rechecking the
/// terminated flag.
const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Error returned by the enqueue family once the queue shut down.
///
/// The queue stops accepting work the moment termination begins, a
/// submission racing with shutdown is rolled back and rejected the same way.
#[derive(Debug, PartialEq, Eq, Error)]
#[error("task queue is shut down")]
pub struct EnqueueError;

struct Shared {
    queue: BlockingQueue<Task>,
    terminated: AtomicBool,

    // tasks accepted but not yet finished running
    pending: Mutex<usize>,
    quiesced: Condvar,
    waiters: AtomicUsize,
}

impl Shared {
    fn accept_one(&self) {
        *self.pending.lock().unwrap() += 1;
    }

    // the counterpart of accept_one, both for a finished run and for
    // rolling back a push that never made it into the queue
    fn finish_one(&self) {
        let mut pending = self.pending.lock().unwrap();
        *pending -= 1;
        let idle = *pending == 0;
        drop(pending);

        // only bother the condvar when someone is waiting
        if idle && self.waiters.load(Ordering::Relaxed) != 0 {
            self.quiesced.notify_all();
        }
    }

    fn quiesce(&self) {
        let mut pending = self.pending.lock().unwrap();
        self.waiters.fetch_add(1, Ordering::Relaxed);

        while *pending != 0 {
            pending = self.quiesced.wait(pending).unwrap();
        }

        self.waiters.fetch_sub(1, Ordering::Relaxed);
    }

    fn quiesce_deadline(&self, deadline: Instant) -> bool {
        let mut pending = self.pending.lock().unwrap();
        self.waiters.fetch_add(1, Ordering::Relaxed);

        let reached = loop {
            if *pending == 0 {
                break true;
            }

            let now = Instant::now();
            if now >= deadline {
                break false;
            }

            let (guard, _) = self.quiesced.wait_timeout(pending, deadline - now).unwrap();
            pending = guard;
        };

        self.waiters.fetch_sub(1, Ordering::Relaxed);
        reached
    }
}

fn worker_main(shared: &Shared, _index: usize) {
    #[cfg(feature = "tracing")]
    trace!("worker {} started", _index);

    loop {
        if shared.terminated.load(Ordering::Acquire) {
            break;
        }

        match shared.queue.pop_timeout(POLL_INTERVAL) {
            Ok(task) => {
                task.run();
                shared.finish_one();
            }
            Err(PopTimeoutError::Timeout) => {}
            Err(PopTimeoutError::Closed) => break,
        }
    }

    #[cfg(feature = "tracing")]
    trace!("worker {} exited", _index);
}

/// A bounded task queue backed by a fixed pool of worker threads.
///
/// Submitted callables are queued in FIFO order and picked up by whichever
/// worker frees up first, every submission hands back an [`AsyncResult`]
/// carrying the callable's eventual value or panic. When the queue is full,
/// [`enqueue`] blocks the submitter until a slot frees up.
///
/// Dropping the queue waits for every accepted task by default, see
/// [`set_wait_before_drop`].
///
/// [`AsyncResult`]: struct.AsyncResult.html
/// [`enqueue`]: struct.TaskQueue.html#method.enqueue
/// [`set_wait_before_drop`]: struct.TaskQueue.html#method.set_wait_before_drop
pub struct TaskQueue {
    shared: Arc<Shared>,
    workers: Vec<thread::JoinHandle<()>>,
    wait_before_drop: AtomicBool,
}

impl TaskQueue {
    /// Returns a queue with one worker per logical CPU and no practical
    /// queue capacity limit.
    pub fn new() -> TaskQueue {
        TaskQueue::with_threads(num_cpus::get().max(1))
    }

    /// Returns a queue with `threads` workers and no practical queue
    /// capacity limit.
    ///
    /// # Panics
    ///
    /// When `threads` is zero.
    pub fn with_threads(threads: usize) -> TaskQueue {
        TaskQueue::build(threads, BlockingQueue::new())
    }

    /// Returns a queue with `threads` workers holding at most `capacity`
    /// not-yet-started tasks.
    ///
    /// # Panics
    ///
    /// When `threads` or `capacity` is zero.
    pub fn with_capacity(threads: usize, capacity: usize) -> TaskQueue {
        TaskQueue::build(threads, BlockingQueue::with_capacity(capacity))
    }

    fn build(threads: usize, queue: BlockingQueue<Task>) -> TaskQueue {
        assert!(threads >= 1, "task queue needs at least 1 worker thread");

        let shared = Arc::new(Shared {
            queue,
            terminated: AtomicBool::new(false),
            pending: Mutex::new(0),
            quiesced: Condvar::new(),
            waiters: AtomicUsize::new(0),
        });

        let workers = (0..threads)
            .map(|index| {
                let shared = shared.clone();
                thread::Builder::new()
                    .name(format!("antri-worker-{}", index))
                    .spawn(move || worker_main(&shared, index))
                    .expect("failed to spawn worker thread")
            })
            .collect();

        TaskQueue {
            shared,
            workers,
            wait_before_drop: AtomicBool::new(true),
        }
    }

    /// Queue `f` for execution on a worker thread.
    ///
    /// Blocks while the queue is at capacity, a full queue pushes back on
    /// its producers. The returned [`AsyncResult`] settles once the task
    /// ran (or never will).
    ///
    /// Fails when the queue shut down, the callable is dropped in that case.
    ///
    /// [`AsyncResult`]: struct.AsyncResult.html
    pub fn enqueue<F, R>(&self, f: F) -> Result<AsyncResult<R>, EnqueueError>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        if self.shared.terminated.load(Ordering::Acquire) {
            return Err(EnqueueError);
        }

        let (sink, result) = channel();
        let task = task::wrap(f, sink);

        // reserve before the possibly blocking push, a concurrent wait()
        // must not observe "all done" while this task is in flight
        self.shared.accept_one();

        match self.shared.queue.push(task) {
            Ok(()) => Ok(result),
            Err(_) => {
                // the queue closed under us, undo the reservation
                self.shared.finish_one();
                Err(EnqueueError)
            }
        }
    }

    /// As [`enqueue`], but never blocks the calling thread.
    ///
    /// The possibly blocking push is handed to a detached helper thread, so
    /// the [`AsyncResult`] is returned before the task is even queued.
    /// Because of that, two `enqueue_async` calls carry no ordering
    /// guarantee relative to each other.
    ///
    /// If the queue closes before the helper gets the task in, the task is
    /// dropped and its result observes [`TaskError::Lost`].
    ///
    /// [`enqueue`]: struct.TaskQueue.html#method.enqueue
    /// [`TaskError::Lost`]: enum.TaskError.html#variant.Lost
    pub fn enqueue_async<F, R>(&self, f: F) -> Result<AsyncResult<R>, EnqueueError>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        if self.shared.terminated.load(Ordering::Acquire) {
            return Err(EnqueueError);
        }

        let (sink, result) = channel();
        let task = task::wrap(f, sink);

        self.shared.accept_one();

        let shared = self.shared.clone();
        thread::spawn(move || {
            if shared.queue.push(task).is_err() {
                shared.finish_one();
            }
        });

        Ok(result)
    }

    /// Block until every accepted task has finished running.
    ///
    /// "All done" is a point-in-time observation, another thread may enqueue
    /// new work the moment this returns.
    pub fn wait(&self) {
        self.shared.quiesce();
    }

    /// As [`wait`], but gives up after `timeout`.
    ///
    /// Returns whether quiescence was reached.
    ///
    /// [`wait`]: struct.TaskQueue.html#method.wait
    pub fn wait_for(&self, timeout: Duration) -> bool {
        match Instant::now().checked_add(timeout) {
            Some(deadline) => self.shared.quiesce_deadline(deadline),
            None => {
                self.shared.quiesce();
                true
            }
        }
    }

    /// As [`wait`], but gives up once `deadline` passes.
    ///
    /// Returns whether quiescence was reached.
    ///
    /// [`wait`]: struct.TaskQueue.html#method.wait
    pub fn wait_until(&self, deadline: Instant) -> bool {
        self.shared.quiesce_deadline(deadline)
    }

    /// Number of tasks accepted but not yet finished running.
    pub fn pending_tasks(&self) -> usize {
        *self.shared.pending.lock().unwrap()
    }

    /// Configure whether dropping the queue first waits for every accepted
    /// task to finish. Defaults to `true`.
    ///
    /// When disabled, tasks still sitting in the queue at drop time never
    /// run and their results observe [`TaskError::Lost`]. A task already
    /// running finishes either way, workers are never preempted mid-task.
    ///
    /// [`TaskError::Lost`]: enum.TaskError.html#variant.Lost
    pub fn set_wait_before_drop(&self, wait: bool) {
        self.wait_before_drop.store(wait, Ordering::Relaxed);
    }

    /// Will dropping the queue wait for accepted tasks ?
    pub fn wait_before_drop(&self) -> bool {
        self.wait_before_drop.load(Ordering::Relaxed)
    }

    /// Shut the queue down, joining every worker thread.
    ///
    /// Honors [`wait_before_drop`], exactly like dropping the queue, but
    /// callable at a chosen point and idempotent. Submissions after this
    /// fail with [`EnqueueError`].
    ///
    /// [`wait_before_drop`]: struct.TaskQueue.html#method.wait_before_drop
    /// [`EnqueueError`]: struct.EnqueueError.html
    pub fn shutdown(&mut self) {
        if self.workers.is_empty() {
            return;
        }

        if self.wait_before_drop() {
            self.wait();
        }

        #[cfg(feature = "tracing")]
        trace!("task queue is shutting down");

        self.shared.terminated.store(true, Ordering::Release);
        self.shared.queue.close();

        for worker in self.workers.drain(..) {
            worker.join().expect("worker thread panicked");
        }
    }
}

impl Default for TaskQueue {
    fn default() -> TaskQueue {
        TaskQueue::new()
    }
}

impl Drop for TaskQueue {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Member-call submission.
///
/// The receiver conventions of a member call (by value, by reference,
/// through a pointer) map onto ownership types here: pass the
/// receiver itself, an [`Arc`], or an [`Arc`]`<`[`Mutex`]`>`. Extra call
/// arguments are captured by the closure.
///
/// [`Arc`]: https://doc.rust-lang.org/std/sync/struct.Arc.html
/// [`Mutex`]: https://doc.rust-lang.org/std/sync/struct.Mutex.html
impl TaskQueue {
    /// Queue a call on a receiver taken by value.
    ///
    /// The receiver moves into the task and `method` may consume it, pass a
    /// clone to keep the original.
    pub fn enqueue_on<T, R, M>(&self, receiver: T, method: M) -> Result<AsyncResult<R>, EnqueueError>
    where
        T: Send + 'static,
        R: Send + 'static,
        M: FnOnce(T) -> R + Send + 'static,
    {
        self.enqueue(move || method(receiver))
    }

    /// Queue a call on a shared receiver, `method` sees `&T`.
    ///
    /// The `Arc` keeps the receiver alive until the call ran.
    pub fn enqueue_on_ref<T, R, M>(
        &self,
        receiver: Arc<T>,
        method: M,
    ) -> Result<AsyncResult<R>, EnqueueError>
    where
        T: Send + Sync + 'static,
        R: Send + 'static,
        M: FnOnce(&T) -> R + Send + 'static,
    {
        self.enqueue(move || method(&receiver))
    }

    /// Queue a call on a shared mutable receiver, `method` sees `&mut T`
    /// under the lock.
    pub fn enqueue_on_mut<T, R, M>(
        &self,
        receiver: Arc<Mutex<T>>,
        method: M,
    ) -> Result<AsyncResult<R>, EnqueueError>
    where
        T: Send + 'static,
        R: Send + 'static,
        M: FnOnce(&mut T) -> R + Send + 'static,
    {
        self.enqueue(move || method(&mut receiver.lock().unwrap()))
    }
}
