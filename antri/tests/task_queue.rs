use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use antri::{TaskError, TaskQueue};

#[test]
fn computes_a_value() {
    let queue = TaskQueue::with_threads(2);

    let result = queue.enqueue(|| 2 + 2).unwrap();

    assert_eq!(result.get(), Ok(4));
}

#[test]
fn unit_results_work() {
    let queue = TaskQueue::with_threads(1);

    let result = queue.enqueue(|| ()).unwrap();

    assert_eq!(result.get(), Ok(()));
}

#[test]
fn single_worker_runs_in_acceptance_order() {
    let queue = TaskQueue::with_threads(1);
    let order = Arc::new(Mutex::new(Vec::new()));

    for i in 0..100 {
        let order = order.clone();
        queue.enqueue(move || order.lock().unwrap().push(i)).unwrap();
    }

    queue.wait();

    let order = order.lock().unwrap();
    assert_eq!(*order, (0..100).collect::<Vec<_>>());
}

#[test]
fn full_queue_blocks_enqueue() {
    let queue = Arc::new(TaskQueue::with_capacity(1, 1));
    let unblocked = Arc::new(AtomicBool::new(false));

    // keep the only worker busy, then fill the only queue slot
    queue
        .enqueue(|| thread::sleep(Duration::from_millis(400)))
        .unwrap();
    queue.enqueue(|| ()).unwrap();

    let submitter = {
        let queue = queue.clone();
        let unblocked = unblocked.clone();
        thread::spawn(move || {
            queue.enqueue(|| ()).unwrap();
            unblocked.store(true, Ordering::SeqCst);
        })
    };

    thread::sleep(Duration::from_millis(150));
    assert!(
        !unblocked.load(Ordering::SeqCst),
        "enqueue should block while the queue is full"
    );

    submitter.join().unwrap();
    assert!(unblocked.load(Ordering::SeqCst));
    queue.wait();
}

#[test]
fn enqueue_async_returns_without_blocking() {
    let queue = TaskQueue::with_capacity(1, 1);

    queue
        .enqueue(|| thread::sleep(Duration::from_millis(300)))
        .unwrap();
    queue.enqueue(|| ()).unwrap();

    // both the worker and the queue slot are occupied now
    let start = Instant::now();
    let result = queue.enqueue_async(|| 5).unwrap();
    assert!(
        start.elapsed() < Duration::from_millis(200),
        "enqueue_async must not wait for a queue slot"
    );

    assert_eq!(result.get(), Ok(5));
}

#[test]
fn wait_reaches_quiescence() {
    let queue = TaskQueue::with_threads(4);

    let results: Vec<_> = (0..32)
        .map(|i| {
            queue
                .enqueue(move || {
                    thread::sleep(Duration::from_millis(10));
                    i
                })
                .unwrap()
        })
        .collect();

    queue.wait();

    assert_eq!(queue.pending_tasks(), 0);
    for (i, result) in results.iter().enumerate() {
        assert!(result.is_ready());
        assert_eq!(result.get(), Ok(i));
    }
}

#[test]
fn wait_for_gives_up_and_recovers() {
    let queue = TaskQueue::with_threads(1);

    queue
        .enqueue(|| thread::sleep(Duration::from_millis(300)))
        .unwrap();

    assert!(!queue.wait_for(Duration::from_millis(50)));
    assert!(queue.wait_for(Duration::from_secs(10)));
    assert_eq!(queue.pending_tasks(), 0);
}

#[test]
fn wait_until_honors_the_deadline() {
    let queue = TaskQueue::with_threads(1);

    queue
        .enqueue(|| thread::sleep(Duration::from_millis(200)))
        .unwrap();

    assert!(!queue.wait_until(Instant::now() + Duration::from_millis(50)));
    assert!(queue.wait_until(Instant::now() + Duration::from_secs(10)));
}

#[test]
fn panics_travel_to_the_result_and_spare_the_worker() {
    let queue = TaskQueue::with_threads(1);

    let failed = queue.enqueue(|| -> i32 { panic!("boom") }).unwrap();

    match failed.get() {
        Err(TaskError::Panicked(message)) => assert_eq!(message, "boom"),
        other => panic!("unexpected outcome: {:?}", other),
    }

    // the sole worker must still be alive to run this
    let ok = queue.enqueue(|| 1).unwrap();
    assert_eq!(ok.get(), Ok(1));
}

#[test]
fn repeated_reads_observe_the_same_outcome() {
    let queue = TaskQueue::with_threads(1);

    let result = queue.enqueue(|| 7).unwrap();
    result.wait();
    assert_eq!(result.get(), Ok(7));
    assert_eq!(result.get(), Ok(7));

    let failed = queue.enqueue(|| -> i32 { panic!("again") }).unwrap();
    assert!(failed.get().is_err());
    assert_eq!(failed.get(), Err(TaskError::Panicked("again".to_string())));
}

#[test]
fn drop_waits_for_queued_tasks_by_default() {
    let completions = Arc::new(AtomicUsize::new(0));
    let mut results = Vec::new();

    let start = Instant::now();
    {
        let queue = TaskQueue::with_capacity(1, 5);
        assert!(queue.wait_before_drop());

        for _ in 0..5 {
            let completions = completions.clone();
            results.push(
                queue
                    .enqueue(move || {
                        thread::sleep(Duration::from_millis(100));
                        completions.fetch_add(1, Ordering::SeqCst);
                    })
                    .unwrap(),
            );
        }
    }

    assert!(start.elapsed() >= Duration::from_millis(500));
    assert_eq!(completions.load(Ordering::SeqCst), 5);
    for result in &results {
        assert!(result.is_ready());
        assert_eq!(result.get(), Ok(()));
    }
}

#[test]
fn drop_without_waiting_loses_queued_tasks() {
    let completions = Arc::new(AtomicUsize::new(0));
    let mut results = Vec::new();

    let queue = TaskQueue::with_capacity(1, 5);
    queue.set_wait_before_drop(false);
    assert!(!queue.wait_before_drop());

    for _ in 0..5 {
        let completions = completions.clone();
        results.push(
            queue
                .enqueue(move || {
                    thread::sleep(Duration::from_millis(300));
                    completions.fetch_add(1, Ordering::SeqCst);
                })
                .unwrap(),
        );
    }

    // let the worker get into the first task
    thread::sleep(Duration::from_millis(150));

    let start = Instant::now();
    drop(queue);

    // only the task already running may finish, the rest never start
    assert!(start.elapsed() < Duration::from_secs(1));
    assert!(completions.load(Ordering::SeqCst) < 5);
    assert_eq!(
        results.pop().unwrap().into_result(),
        Err(TaskError::Lost),
        "a task that never ran must report a lost result"
    );
}

#[test]
fn enqueue_after_shutdown_is_rejected() {
    let mut queue = TaskQueue::with_threads(1);

    let result = queue.enqueue(|| 1).unwrap();
    assert_eq!(result.get(), Ok(1));

    queue.shutdown();
    // idempotent
    queue.shutdown();

    assert!(queue.enqueue(|| 2).is_err());
    assert!(queue.enqueue_async(|| 3).is_err());
}

#[test]
fn results_outlive_the_queue() {
    let queue = TaskQueue::with_threads(1);
    let result = queue.enqueue(|| String::from("done")).unwrap();

    drop(queue);

    assert_eq!(result.get(), Ok(String::from("done")));
}

#[test]
fn many_submitters_at_once() {
    let queue = Arc::new(TaskQueue::with_capacity(4, 8));
    let counter = Arc::new(AtomicUsize::new(0));

    let submitters: Vec<_> = (0..8)
        .map(|_| {
            let queue = queue.clone();
            let counter = counter.clone();
            thread::spawn(move || {
                for _ in 0..50 {
                    let counter = counter.clone();
                    queue
                        .enqueue(move || {
                            counter.fetch_add(1, Ordering::SeqCst);
                        })
                        .unwrap();
                }
            })
        })
        .collect();

    for submitter in submitters {
        submitter.join().unwrap();
    }

    queue.wait();
    assert_eq!(counter.load(Ordering::SeqCst), 8 * 50);
}

#[derive(Clone)]
struct Multiplier {
    factor: i32,
}

impl Multiplier {
    fn apply(&self, n: i32) -> i32 {
        self.factor * n
    }

    fn bump(&mut self, by: i32) -> i32 {
        self.factor += by;
        self.factor
    }

    fn into_factor(self) -> i32 {
        self.factor
    }
}

#[test]
fn member_call_receiver_conventions() {
    let queue = TaskQueue::with_threads(1);

    // by value, the submitter keeps its copy
    let m = Multiplier { factor: 3 };
    let by_value = queue.enqueue_on(m.clone(), |m| m.apply(10)).unwrap();
    assert_eq!(by_value.get(), Ok(30));
    assert_eq!(m.factor, 3);

    // by move, the receiver is consumed by the call
    let by_move = queue.enqueue_on(m, Multiplier::into_factor).unwrap();
    assert_eq!(by_move.get(), Ok(3));

    // by shared reference
    let shared = Arc::new(Multiplier { factor: 5 });
    let by_ref = queue
        .enqueue_on_ref(shared.clone(), |m| m.apply(4))
        .unwrap();
    assert_eq!(by_ref.get(), Ok(20));
    assert_eq!(shared.apply(1), 5);

    // by shared mutable cell, the mutation is visible afterwards
    let cell = Arc::new(Mutex::new(Multiplier { factor: 1 }));
    let by_mut = queue.enqueue_on_mut(cell.clone(), |m| m.bump(7)).unwrap();
    assert_eq!(by_mut.get(), Ok(8));
    assert_eq!(cell.lock().unwrap().factor, 8);
}
