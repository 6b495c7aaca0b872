use std::thread;
use std::time::Duration;

use antri::TaskQueue;

// a full queue pushes back on the submitting thread: watch the
// "enqueue" lines stall once the first 3 slots are taken

fn main() {
    #[cfg(feature = "tracing")]
    simple_logger::init().unwrap();

    let queue = TaskQueue::with_capacity(3, 3);

    for i in 0..30 {
        println!(">>> enqueue [{}]", i);
        queue
            .enqueue(move || {
                println!("--- run [{}]", i);
                thread::sleep(Duration::from_secs(1));
            })
            .unwrap();
        println!("<<< enqueue [{}]", i);
    }

    queue.wait();
}
