use std::ptr;

use crate::queue::LfQueue;

/// Handle to a queue instance (opaque pointer).
pub struct QueueHandle {
    inner: LfQueue,
}

/// Bytes needed for a queue region of `n_elements` slots of `element_size`
/// payload bytes each.
#[no_mangle]
pub extern "C" fn lfq_required_memory(n_elements: usize, element_size: usize) -> usize {
    LfQueue::required_memory(n_elements, element_size)
}

/// Allocate and format a queue.
///
/// # Returns
/// * Pointer to `QueueHandle`, or NULL on invalid arguments or allocation
///   failure. Release with `lfq_destroy`.
#[no_mangle]
pub extern "C" fn lfq_init(n_elements: usize, element_size: usize) -> *mut QueueHandle {
    match LfQueue::new(n_elements, element_size) {
        Ok(queue) => Box::into_raw(Box::new(QueueHandle { inner: queue })),
        Err(e) => {
            eprintln!("FFI Error: failed to init queue: {}", e);
            ptr::null_mut()
        }
    }
}

/// Format a caller-provided buffer (e.g. a shared-memory mapping) as a queue.
/// The buffer must hold at least `lfq_required_memory(n_elements,
/// element_size)` bytes and outlive the handle; it is never freed by
/// `lfq_destroy`.
#[no_mangle]
pub unsafe extern "C" fn lfq_mem_init(
    mem: *mut u8,
    n_elements: usize,
    element_size: usize,
) -> *mut QueueHandle {
    if mem.is_null() {
        return ptr::null_mut();
    }
    match LfQueue::mem_init(mem, n_elements, element_size) {
        Ok(queue) => Box::into_raw(Box::new(QueueHandle { inner: queue })),
        Err(e) => {
            eprintln!("FFI Error: failed to format queue region: {}", e);
            ptr::null_mut()
        }
    }
}

/// Attach to an already-formatted queue region.
///
/// # Returns
/// * Pointer to `QueueHandle`, or NULL if the region's magic does not match.
#[no_mangle]
pub unsafe extern "C" fn lfq_attach(mem: *mut u8) -> *mut QueueHandle {
    if mem.is_null() {
        return ptr::null_mut();
    }
    match LfQueue::attach(mem) {
        Ok(queue) => Box::into_raw(Box::new(QueueHandle { inner: queue })),
        Err(e) => {
            eprintln!("FFI Error: failed to attach: {}", e);
            ptr::null_mut()
        }
    }
}

/// Free a queue handle. Releases the backing region only when the handle was
/// created by `lfq_init`.
#[no_mangle]
pub unsafe extern "C" fn lfq_destroy(handle: *mut QueueHandle) {
    if !handle.is_null() {
        let _ = Box::from_raw(handle); // Dropped automatically
    }
}

/// Pop a free payload slot.
///
/// # Returns
/// * Pointer to `element_size` writable bytes, or NULL when every slot is in
///   use. Publish with `lfq_enqueue` or hand back with `lfq_put`.
#[no_mangle]
pub unsafe extern "C" fn lfq_get(handle: *mut QueueHandle) -> *mut u8 {
    if handle.is_null() {
        return ptr::null_mut();
    }
    match (*handle).inner.get() {
        Some(mut element) => element.as_mut_ptr(),
        None => ptr::null_mut(),
    }
}

/// Publish a slot previously returned by `lfq_get`.
#[no_mangle]
pub unsafe extern "C" fn lfq_enqueue(handle: *mut QueueHandle, data: *mut u8) {
    if handle.is_null() || data.is_null() {
        return;
    }
    let queue = &(*handle).inner;
    let element = queue.element_from_raw(data);
    queue.enqueue(element);
}

/// Claim the oldest published slot.
///
/// # Returns
/// * Pointer to the payload, or NULL when the queue is empty. Hand back with
///   `lfq_put` after consuming.
#[no_mangle]
pub unsafe extern "C" fn lfq_dequeue(handle: *mut QueueHandle) -> *mut u8 {
    if handle.is_null() {
        return ptr::null_mut();
    }
    match (*handle).inner.dequeue() {
        Some(mut element) => element.as_mut_ptr(),
        None => ptr::null_mut(),
    }
}

/// Return a slot previously returned by `lfq_dequeue` to the free list.
#[no_mangle]
pub unsafe extern "C" fn lfq_put(handle: *mut QueueHandle, data: *mut u8) {
    if handle.is_null() || data.is_null() {
        return;
    }
    let queue = &(*handle).inner;
    let element = queue.element_from_raw(data);
    queue.put(element);
}
