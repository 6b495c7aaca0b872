use antri::TaskQueue;

fn main() {
    #[cfg(feature = "tracing")]
    simple_logger::init().unwrap();

    let queue = TaskQueue::with_threads(2);

    let result = queue.enqueue(|| 21 * 2).unwrap();

    println!("calculated value: {}", result.get().unwrap());
}
