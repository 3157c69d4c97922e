// Producer/consumer message layer over named shared memory.
#![cfg(unix)]

use std::ffi::CString;
use std::time::Duration;

use lfq::channel::QueueBuilder;
use serial_test::serial;

fn cleanup(name: &str) {
    let c_name = CString::new(name).unwrap();
    unsafe { libc::shm_unlink(c_name.as_ptr()) };
}

#[test]
#[serial]
fn send_receive_roundtrip() {
    const NAME: &str = "/lfq_test_channel_roundtrip";
    cleanup(NAME);

    let producer = QueueBuilder::new(NAME)
        .with_capacity(16)
        .with_element_size(64)
        .build_producer()
        .unwrap();
    let consumer = QueueBuilder::new(NAME)
        .with_capacity(16)
        .with_element_size(64)
        .build_consumer()
        .unwrap();

    producer.send("hello world").unwrap();
    assert_eq!(consumer.receive().unwrap(), b"hello world");

    // Messages come out in order, lengths preserved.
    for i in 0..10 {
        producer.send(format!("message {i}")).unwrap();
    }
    for i in 0..10 {
        assert_eq!(consumer.receive().unwrap(), format!("message {i}").as_bytes());
    }

    assert!(consumer.receive().is_none());
    assert!(consumer.receive_timeout(Duration::from_millis(10)).is_none());

    producer.shm().unlink().unwrap();
}

#[test]
#[serial]
fn oversized_message_is_rejected() {
    const NAME: &str = "/lfq_test_channel_oversize";
    cleanup(NAME);

    let producer = QueueBuilder::new(NAME)
        .with_capacity(4)
        .with_element_size(64)
        .build_producer()
        .unwrap();

    assert_eq!(producer.max_message_size(), 60);
    producer.send(vec![0u8; 60]).unwrap();
    let err = producer.send(vec![0u8; 61]).unwrap_err();
    assert_eq!(err.kind(), std::io::ErrorKind::InvalidInput);

    producer.shm().unlink().unwrap();
}

#[test]
#[serial]
fn full_queue_would_block() {
    const NAME: &str = "/lfq_test_channel_full";
    cleanup(NAME);

    let producer = QueueBuilder::new(NAME)
        .with_capacity(4)
        .with_element_size(64)
        .build_producer()
        .unwrap();

    for i in 0..4 {
        producer.send(format!("msg {i}")).unwrap();
    }
    let err = producer.send("one too many").unwrap_err();
    assert_eq!(err.kind(), std::io::ErrorKind::WouldBlock);

    // Draining one slot makes room again.
    let consumer = QueueBuilder::new(NAME)
        .with_capacity(4)
        .with_element_size(64)
        .build_consumer()
        .unwrap();
    assert_eq!(consumer.receive().unwrap(), b"msg 0");
    producer.send("fits now").unwrap();

    producer.shm().unlink().unwrap();
}

#[test]
#[serial]
fn consumer_requires_existing_queue() {
    const NAME: &str = "/lfq_test_channel_missing";
    cleanup(NAME);

    assert!(QueueBuilder::new(NAME).build_consumer().is_err());
}

#[test]
#[serial]
fn blocking_receive_sees_concurrent_send() {
    const NAME: &str = "/lfq_test_channel_blocking";
    cleanup(NAME);

    let producer = QueueBuilder::new(NAME)
        .with_capacity(8)
        .with_element_size(64)
        .build_producer()
        .unwrap();
    let consumer = QueueBuilder::new(NAME)
        .with_capacity(8)
        .with_element_size(64)
        .build_consumer()
        .unwrap();

    let receiver = std::thread::spawn(move || consumer.receive_blocking());

    std::thread::sleep(Duration::from_millis(50));
    producer.send("wake up").unwrap();

    assert_eq!(receiver.join().unwrap(), b"wake up");
    producer.shm().unlink().unwrap();
}
