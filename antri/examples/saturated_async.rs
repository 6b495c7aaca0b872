use std::collections::VecDeque;
use std::thread;
use std::time::Duration;

use antri::TaskQueue;

// same load as the saturated example, but enqueue_async never stalls the
// submitting thread, the blocking push happens on a helper thread

fn main() {
    #[cfg(feature = "tracing")]
    simple_logger::init().unwrap();

    let queue = TaskQueue::with_capacity(3, 3);

    let mut results = VecDeque::new();

    for i in 0..30 {
        println!(">>> enqueue [{}]", i);
        let result = queue
            .enqueue_async(move || {
                println!("--- run [{}]", i);
                thread::sleep(Duration::from_secs(1));
            })
            .unwrap();
        results.push_back(result);
        println!("<<< enqueue [{}]", i);
    }

    while let Some(result) = results.pop_front() {
        result.wait();
    }
}
