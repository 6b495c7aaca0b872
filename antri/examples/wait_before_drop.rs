use std::thread;
use std::time::Duration;

use antri::TaskQueue;

fn main() {
    #[cfg(feature = "tracing")]
    simple_logger::init().unwrap();

    println!(">>> wait before drop");
    {
        let queue = TaskQueue::with_capacity(1, 5);
        for i in 0..5 {
            queue
                .enqueue(move || {
                    println!("<<< task [{}]", i);
                    thread::sleep(Duration::from_secs(1));
                    println!(">>> task [{}]", i);
                })
                .unwrap();
        }
        // dropping the queue runs all 5 tasks first
    }
    println!("<<< wait before drop");

    println!(">>> don't wait before drop");
    {
        let queue = TaskQueue::with_capacity(1, 5);
        queue.set_wait_before_drop(false);
        for i in 0..5 {
            queue
                .enqueue(move || {
                    println!("<<< task [{}]", i);
                    thread::sleep(Duration::from_secs(1));
                    println!(">>> task [{}]", i);
                })
                .unwrap();
        }
        // dropping the queue only lets the running task finish,
        // the rest never run
    }
    println!("<<< don't wait before drop");
}
