use lfq::channel::QueueBuilder;
use std::env;

const QUEUE_NAME: &str = "/lfq_demo";

fn main() -> std::io::Result<()> {
    let args: Vec<String> = env::args().collect();
    let capacity: usize = args.get(1).and_then(|s| s.parse().ok()).unwrap_or(1024);
    let element_size: usize = args.get(2).and_then(|s| s.parse().ok()).unwrap_or(256);

    println!("Blocking Consumer: Attaching to queue \"{}\"", QUEUE_NAME);

    let consumer = QueueBuilder::new(QUEUE_NAME)
        .with_capacity(capacity)
        .with_element_size(element_size)
        .build_consumer()?;

    println!("Blocking Consumer: Waiting for messages...");

    loop {
        let data = consumer.receive_blocking();
        let msg = String::from_utf8_lossy(&data);
        println!("Received: {}", msg);
    }
}
