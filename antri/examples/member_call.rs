use std::sync::{Arc, Mutex};

use antri::TaskQueue;

#[derive(Clone)]
struct Multiply {
    m: i32,
}

impl Multiply {
    fn calculate(&self, n: i32) -> i32 {
        n * self.m
    }

    fn set(&mut self, m: i32) -> i32 {
        self.m = m;
        self.m
    }

    fn into_product(self, n: i32) -> i32 {
        n * self.m
    }
}

fn main() {
    #[cfg(feature = "tracing")]
    simple_logger::init().unwrap();

    let queue = TaskQueue::with_threads(1);

    // receiver passed by value (a copy)
    let m = Multiply { m: 3 };
    let r = queue.enqueue_on(m.clone(), |m| m.calculate(10)).unwrap();
    println!("by value: {}", r.get().unwrap());

    // receiver moved into the task
    let r = queue.enqueue_on(m, |m| m.into_product(10)).unwrap();
    println!("by move: {}", r.get().unwrap());

    // receiver shared, the call sees it by reference
    let shared = Arc::new(Multiply { m: 5 });
    let r = queue
        .enqueue_on_ref(shared.clone(), |m| m.calculate(10))
        .unwrap();
    println!("by reference: {}", r.get().unwrap());

    // receiver shared and mutable, the call mutates it in place
    let cell = Arc::new(Mutex::new(Multiply { m: 0 }));
    let r = queue.enqueue_on_mut(cell.clone(), |m| m.set(7)).unwrap();
    println!("by mutable cell: {}", r.get().unwrap());
    println!("factor is now: {}", cell.lock().unwrap().m);
}
