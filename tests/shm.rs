// Named shared-memory tests. These touch global POSIX names, so every test
// runs #[serial] and unlinks its name on the way in and out.
#![cfg(unix)]

use std::ffi::CString;

use lfq::core::ShmQueue;
use lfq::{Element, LfQueue};
use serial_test::serial;

fn cleanup(name: &str) {
    let c_name = CString::new(name).unwrap();
    unsafe { libc::shm_unlink(c_name.as_ptr()) };
}

fn write_u32(element: &mut Element<'_>, value: u32) {
    element.as_mut_slice()[..4].copy_from_slice(&value.to_le_bytes());
}

fn read_u32(element: &Element<'_>) -> u32 {
    let mut bytes = [0u8; 4];
    bytes.copy_from_slice(&element.as_slice()[..4]);
    u32::from_le_bytes(bytes)
}

#[test]
#[serial]
fn create_attach_roundtrip() {
    const NAME: &str = "/lfq_test_roundtrip";
    cleanup(NAME);

    let creator = ShmQueue::create(NAME, 10, 4).unwrap();
    assert_eq!(creator.size(), LfQueue::required_memory(10, 4));

    let mut element = creator.queue().get().unwrap();
    write_u32(&mut element, 123);
    creator.queue().enqueue(element);

    // A second mapping of the same name sees the queued element.
    let joiner = ShmQueue::attach(NAME, 10, 4).unwrap();
    assert_eq!(joiner.queue().capacity(), 10);
    let element = joiner.queue().dequeue().unwrap();
    assert_eq!(read_u32(&element), 123);
    joiner.queue().put(element);

    assert!(creator.queue().dequeue().is_none());

    creator.unlink().unwrap();
}

#[test]
#[serial]
fn attach_to_missing_name_fails() {
    cleanup("/lfq_test_missing");
    assert!(ShmQueue::attach("/lfq_test_missing", 10, 4).is_err());
}

#[test]
#[serial]
fn attach_rejects_mismatched_geometry() {
    const NAME: &str = "/lfq_test_geometry";
    cleanup(NAME);

    let creator = ShmQueue::create(NAME, 10, 4).unwrap();

    let err = ShmQueue::attach(NAME, 20, 4).unwrap_err();
    assert_eq!(err.kind(), std::io::ErrorKind::InvalidData);

    let err = ShmQueue::attach(NAME, 10, 16).unwrap_err();
    assert_eq!(err.kind(), std::io::ErrorKind::InvalidData);

    creator.unlink().unwrap();
}

#[test]
#[serial]
fn attach_rejects_unformatted_region() {
    const NAME: &str = "/lfq_test_unformatted";
    cleanup(NAME);

    // A zeroed object of the right size, never formatted.
    let c_name = CString::new(NAME).unwrap();
    let fd = unsafe {
        libc::shm_open(
            c_name.as_ptr(),
            libc::O_CREAT | libc::O_RDWR,
            (libc::S_IRUSR | libc::S_IWUSR) as libc::mode_t,
        )
    };
    assert!(fd >= 0);
    let size = LfQueue::required_memory(10, 4);
    assert_eq!(unsafe { libc::ftruncate(fd, size as libc::off_t) }, 0);
    unsafe { libc::close(fd) };

    let err = ShmQueue::attach(NAME, 10, 4).unwrap_err();
    assert_eq!(err.kind(), std::io::ErrorKind::InvalidData);

    cleanup(NAME);
}

/// Cross-process scenario: the child attaches by name and produces
/// 0..N_ITER; the parent drains until it has seen every value and checks the
/// arithmetic-series sum.
#[test]
#[serial]
fn cross_process_sum() {
    const NAME: &str = "/lfq_test_cross_process";
    const N_ITER: u64 = 1_000_000;
    cleanup(NAME);

    let creator = ShmQueue::create(NAME, 10, 4).unwrap();

    let pid = unsafe { libc::fork() };
    assert!(pid >= 0, "fork failed");

    if pid == 0 {
        // Child: attach through the name like a real peer process would.
        let status = match ShmQueue::attach(NAME, 10, 4) {
            Ok(shm) => {
                let queue = shm.queue();
                for i in 0..N_ITER {
                    let mut element = loop {
                        if let Some(element) = queue.get() {
                            break element;
                        }
                        std::hint::spin_loop();
                    };
                    write_u32(&mut element, i as u32);
                    queue.enqueue(element);
                }
                0
            }
            Err(_) => 2,
        };
        // Skip the test harness teardown in the forked child.
        unsafe { libc::_exit(status) };
    }

    let queue = creator.queue();
    let mut deq_sum: u64 = 0;
    for _ in 0..N_ITER {
        let element = loop {
            if let Some(element) = queue.dequeue() {
                break element;
            }
            std::hint::spin_loop();
        };
        deq_sum += read_u32(&element) as u64;
        queue.put(element);
    }

    let mut status = 0;
    assert_eq!(unsafe { libc::waitpid(pid, &mut status, 0) }, pid);
    assert!(libc::WIFEXITED(status) && libc::WEXITSTATUS(status) == 0);

    assert_eq!(deq_sum, N_ITER * (N_ITER - 1) / 2);
    assert!(queue.dequeue().is_none());

    creator.unlink().unwrap();
}
