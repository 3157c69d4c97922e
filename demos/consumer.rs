// In demos/consumer.rs
use lfq::channel::QueueBuilder;
use std::env;

const QUEUE_NAME: &str = "/lfq_demo";

fn main() -> std::io::Result<()> {
    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        eprintln!(
            "Usage: {} <expected_messages> [capacity] [element_size]",
            args[0]
        );
        std::process::exit(1);
    }

    let expected_messages: usize = args[1].parse().expect("Invalid number of messages");
    let capacity: usize = args.get(2).and_then(|s| s.parse().ok()).unwrap_or(1024);
    let element_size: usize = args.get(3).and_then(|s| s.parse().ok()).unwrap_or(256);
    let mut received = 0;

    println!("Consumer: Attaching to queue \"{}\"...", QUEUE_NAME);

    let consumer = match QueueBuilder::new(QUEUE_NAME)
        .with_capacity(capacity)
        .with_element_size(element_size)
        .build_consumer()
    {
        Ok(consumer) => {
            println!("Consumer: Attached");
            consumer
        }
        Err(e) => {
            eprintln!("Failed to create consumer: {}", e);
            return Ok(());
        }
    };

    let start = std::time::Instant::now();
    println!("\n{:<10} {}", "Msg #", "Hash");
    println!("{}", "=".repeat(80));

    while received < expected_messages {
        match consumer.receive() {
            Some(data) => {
                if let Ok(message) = String::from_utf8(data) {
                    // Parse "message_number:hash" format
                    if let Some((num_str, hash)) = message.split_once(':') {
                        println!("{:<10} {}", num_str, hash);
                    } else {
                        println!("Invalid format: {}", message);
                    }
                }
                received += 1;

                if received % 100 == 0 {
                    println!("--- Received {} messages ---", received);
                }
            }
            None => {
                if start.elapsed() > std::time::Duration::from_secs(5) {
                    eprintln!("Timeout waiting for messages");
                    break;
                }
                std::thread::yield_now();
            }
        }
    }

    let elapsed = start.elapsed();
    println!("\n{}", "=".repeat(80));
    println!("Consumer: Received {} messages in {:.2?}", received, elapsed);
    println!(
        "Average: {:.2} messages/second",
        received as f64 / elapsed.as_secs_f64()
    );

    if received == expected_messages {
        println!("All messages received successfully");
    }

    Ok(())
}
