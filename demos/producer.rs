// In demos/producer.rs
use lfq::channel::QueueBuilder;
use sha2::{Digest, Sha256};
use std::env;
use std::sync::atomic::Ordering;
use std::sync::Arc;

const QUEUE_NAME: &str = "/lfq_demo";

fn main() -> std::io::Result<()> {
    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        eprintln!(
            "Usage: {} <num_messages> [capacity] [element_size] [--auto-exit]",
            args[0]
        );
        eprintln!("  capacity: optional, number of slots (default: 1024)");
        eprintln!("  element_size: optional, bytes per slot (default: 256)");
        std::process::exit(1);
    }

    let num_messages: usize = args[1].parse().expect("Invalid number of messages");
    let positional: Vec<&String> = args[2..].iter().filter(|s| *s != "--auto-exit").collect();
    let capacity: usize = positional
        .first()
        .and_then(|s| s.parse().ok())
        .unwrap_or(1024);
    let element_size: usize = positional
        .get(1)
        .and_then(|s| s.parse().ok())
        .unwrap_or(256);
    let auto_exit = args.iter().any(|s| s == "--auto-exit");

    println!(
        "Producer: Queue \"{}\": {} slots of {} bytes, {} messages to send",
        QUEUE_NAME, capacity, element_size, num_messages
    );

    // Precompute hashes so the send loop measures the queue, not SHA-256
    let start_precompute = std::time::Instant::now();
    let mut hashes = Vec::with_capacity(num_messages);
    for i in 0..num_messages {
        let mut hasher = Sha256::new();
        hasher.update(format!("message_{}", i).as_bytes());
        hashes.push(format!("{:x}", hasher.finalize()));
    }
    println!(
        "Producer: Precomputed {} hashes in {:.2?}",
        num_messages,
        start_precompute.elapsed()
    );

    let producer = QueueBuilder::new(QUEUE_NAME)
        .with_capacity(capacity)
        .with_element_size(element_size)
        .build_producer()?;

    println!("Producer: Ready, sending messages...");

    let keep_alive = Arc::new(std::sync::atomic::AtomicBool::new(true));
    let keep_alive_for_handler = Arc::clone(&keep_alive);
    ctrlc::set_handler(move || {
        keep_alive_for_handler.store(false, Ordering::SeqCst);
    })
    .expect("Error setting Ctrl+C handler");

    let start_send = std::time::Instant::now();
    let mut total_sent = 0;

    for (msg_idx, hash) in hashes.iter().enumerate() {
        let message = format!("{}:{}", msg_idx, hash);
        loop {
            if !keep_alive.load(Ordering::SeqCst) {
                break;
            }
            match producer.send(&message) {
                Ok(()) => {
                    total_sent += 1;
                    break;
                }
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                    // All slots in flight; give the consumer a moment
                    std::thread::sleep(std::time::Duration::from_micros(100));
                }
                Err(e) => {
                    eprintln!("Producer: Failed to send message {}: {}", msg_idx, e);
                    return Err(e);
                }
            }
        }

        if !keep_alive.load(Ordering::SeqCst) {
            println!("Producer: Interrupted at message {}", msg_idx);
            break;
        }
        if (msg_idx + 1) % 100 == 0 {
            println!("  Sent {} messages", msg_idx + 1);
        }
    }

    let send_time = start_send.elapsed();

    println!("\n{}", "=".repeat(80));
    println!("PRODUCER STATISTICS");
    println!("{}", "=".repeat(80));
    println!("Queue capacity:        {} slots", capacity);
    println!("Element size:          {} bytes", element_size);
    println!("Messages sent:         {}", total_sent);
    println!("Time taken:            {:.3?}", send_time);
    println!(
        "Throughput (TPS):      {:.2} messages/sec",
        total_sent as f64 / send_time.as_secs_f64()
    );
    println!("{}", "=".repeat(80));

    if auto_exit {
        println!("Producer: Auto-exit mode, waiting 2 seconds for consumer...");
        std::thread::sleep(std::time::Duration::from_secs(2));
        println!("Producer: Shutting down");
    } else {
        println!("Press Ctrl+C to exit...");
        while keep_alive.load(Ordering::SeqCst) {
            std::thread::sleep(std::time::Duration::from_millis(100));
        }
        println!("Producer: Shutting down");
    }

    Ok(())
}
