use std::sync::Arc;
use std::thread;

use antri_spin_lock::SpinLock;

fn main() {
    let counter = Arc::new(SpinLock::new(0));

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let counter = counter.clone();
            thread::spawn(move || {
                for _ in 0..100_000 {
                    *counter.lock() += 1;
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    println!("counter: {}", *counter.lock());
}
