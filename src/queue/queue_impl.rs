use std::alloc::{alloc, dealloc, Layout};
use std::fmt;
use std::io;
use std::marker::PhantomData;
use std::mem::{align_of, size_of};
use std::ptr::{self, NonNull};
use std::sync::atomic::Ordering::{AcqRel, Acquire, Relaxed, Release};
use std::sync::atomic::{AtomicU32, AtomicU64};

use crossbeam_utils::CachePadded;

use super::layout::{
    descriptor_gen, descriptor_slot, free_descriptor, is_used, min_element_size, raw_elem_size,
    required_memory, ring_descriptor, QueueHeader, GEN_STALE_WINDOW, MAX_ELEMENTS, QUEUE_MAGIC,
};
use super::queue::{Element, LfQueue};

impl LfQueue {
    /// Bytes needed for a queue region of `n_elements` slots of
    /// `element_size` payload bytes each.
    pub fn required_memory(n_elements: usize, element_size: usize) -> usize {
        required_memory(n_elements, element_size)
    }

    /// Allocate a private region and format a queue in it. The backing
    /// allocation is released when the handle is dropped.
    pub fn new(n_elements: usize, element_size: usize) -> io::Result<LfQueue> {
        validate_config(n_elements, element_size)?;

        let size = required_memory(n_elements, element_size);
        let layout = Layout::from_size_align(size, align_of::<QueueHeader>())
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e.to_string()))?;
        let mem = unsafe { alloc(layout) };
        if mem.is_null() {
            return Err(io::Error::new(
                io::ErrorKind::OutOfMemory,
                format!("failed to allocate {size} bytes for queue region"),
            ));
        }

        let mut queue = match unsafe { Self::mem_init(mem, n_elements, element_size) } {
            Ok(queue) => queue,
            Err(e) => {
                unsafe { dealloc(mem, layout) };
                return Err(e);
            }
        };
        unsafe { (*queue.header.as_ptr()).owns_memory = true };
        queue.owned = Some(layout);
        Ok(queue)
    }

    /// Format a caller-provided buffer as a queue region and return a handle
    /// viewing it. The handle does not own the buffer.
    ///
    /// # Safety
    /// `mem` must be valid for reads and writes of
    /// [`LfQueue::required_memory`]`(n_elements, element_size)` bytes, aligned
    /// to `align_of::<QueueHeader>()`, and must outlive every handle viewing
    /// the region.
    pub unsafe fn mem_init(
        mem: *mut u8,
        n_elements: usize,
        element_size: usize,
    ) -> io::Result<LfQueue> {
        validate_config(n_elements, element_size)?;
        if mem.is_null() || (mem as usize) % align_of::<QueueHeader>() != 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "queue region must be non-null and header-aligned",
            ));
        }

        let header = mem as *mut QueueHeader;
        ptr::write(
            header,
            QueueHeader {
                magic: QUEUE_MAGIC,
                n_elements: n_elements as u64,
                element_size: min_element_size(element_size) as u64,
                free_head: CachePadded::new(AtomicU64::new(0)),
                head: CachePadded::new(AtomicU64::new(1)),
                tail: CachePadded::new(AtomicU64::new(0)),
                mod_count: AtomicU32::new(1),
                owns_memory: false,
            },
        );

        let queue = LfQueue {
            header: NonNull::new_unchecked(header),
            owned: None,
        };

        // Ring positions start as zeroed empty markers; a zero marker reads
        // as "no recorded tail" to the enqueue stale-tail check.
        for i in 0..n_elements as u64 {
            queue.ring_slot(i).store(0, Relaxed);
        }

        // Thread the arena into the free list; the last slot terminates with
        // the 0 sentinel, which no live descriptor can equal because
        // mod_count starts at 1.
        for i in 0..n_elements as u32 {
            let next = if i + 1 == n_elements as u32 {
                0
            } else {
                free_descriptor(1, i + 1)
            };
            queue.slot_link(i).store(next, Relaxed);
        }
        queue.header().free_head.store(free_descriptor(1, 0), Release);

        Ok(queue)
    }

    /// View an already-formatted region. Verifies the magic and nothing
    /// else; never writes to the region.
    ///
    /// # Safety
    /// `mem` must point to a region previously formatted by
    /// [`LfQueue::mem_init`] with a layout this build agrees on, and must
    /// outlive the returned handle.
    pub unsafe fn attach(mem: *mut u8) -> io::Result<LfQueue> {
        if mem.is_null() || (mem as usize) % align_of::<QueueHeader>() != 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "queue region must be non-null and header-aligned",
            ));
        }
        let header = mem as *mut QueueHeader;
        if (*header).magic != QUEUE_MAGIC {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "bad magic: region is not a formatted queue",
            ));
        }
        Ok(LfQueue {
            header: NonNull::new_unchecked(header),
            owned: None,
        })
    }

    /// Pop a free payload slot, or `None` when every slot is queued or held.
    pub fn get(&self) -> Option<Element<'_>> {
        let header = self.header();
        debug_assert_eq!(header.magic, QUEUE_MAGIC);

        let mut current = header.free_head.load(Acquire);
        while current != 0 {
            let slot = descriptor_slot(current);
            let next = self.slot_link(slot).load(Acquire);
            match header.free_head.compare_exchange(current, next, AcqRel, Acquire) {
                Ok(_) => {
                    // Only the tag value matters, not its ordering; the CAS
                    // above already ordered the pop itself.
                    header.mod_count.fetch_add(1, Relaxed);
                    return Some(unsafe { self.element_at(slot) });
                }
                Err(observed) => current = observed,
            }
        }
        None
    }

    /// Return a held slot to the free list. Always succeeds.
    pub fn put(&self, element: Element<'_>) {
        debug_assert_eq!(self.header().magic, QUEUE_MAGIC);
        let slot = self.slot_index_of(element.data.as_ptr());
        self.release_slot(slot);
    }

    /// Publish a slot previously obtained from [`LfQueue::get`] into the
    /// FIFO. Always succeeds; a spinning iteration means another thread made
    /// progress in the meantime.
    pub fn enqueue(&self, element: Element<'_>) {
        debug_assert_eq!(self.header().magic, QUEUE_MAGIC);
        let slot = self.slot_index_of(element.data.as_ptr());
        self.publish_slot(slot);
    }

    /// Claim the oldest published slot, or `None` when the queue is empty.
    /// The returned element must later go back via [`LfQueue::put`].
    pub fn dequeue(&self) -> Option<Element<'_>> {
        let header = self.header();
        debug_assert_eq!(header.magic, QUEUE_MAGIC);
        let n_elements = header.n_elements;

        loop {
            let head = header.head.load(Acquire);
            let tail = header.tail.load(Acquire);
            if head > tail {
                return None;
            }
            let ring = self.ring_slot(head % n_elements);
            let descriptor = ring.load(Acquire);

            let descriptor_generation = descriptor_gen(descriptor) as i64;
            let current_generation = ((head / n_elements) & 0xFFFF_FFFF) as i64;
            let gap = descriptor_generation - current_generation;
            if gap > 0 && gap < GEN_STALE_WINDOW {
                // The position already carries a later lap's publication: our
                // head snapshot went stale while we were reading.
                std::hint::spin_loop();
                continue;
            }
            if !is_used(descriptor) {
                // Another consumer emptied this position first.
                std::hint::spin_loop();
                continue;
            }

            // Swap in an empty marker carrying the tail we observed, so
            // producers holding an older tail snapshot can recognize it.
            if ring.compare_exchange(descriptor, tail, AcqRel, Acquire).is_ok() {
                header.head.fetch_add(1, AcqRel);
                return Some(unsafe { self.element_at(descriptor_slot(descriptor)) });
            }
        }
    }

    pub(crate) fn release_slot(&self, slot: u32) {
        let header = self.header();
        let link = self.slot_link(slot);
        let mut current = header.free_head.load(Acquire);
        loop {
            // The link must be in place before the CAS can expose this slot
            // as the new list head.
            link.store(current, Release);
            let descriptor = free_descriptor(header.mod_count.load(Relaxed), slot);
            match header
                .free_head
                .compare_exchange(current, descriptor, AcqRel, Acquire)
            {
                Ok(_) => return,
                Err(observed) => current = observed,
            }
        }
    }

    pub(crate) fn publish_slot(&self, slot: u32) {
        let header = self.header();
        let n_elements = header.n_elements;

        loop {
            let tail = header.tail.load(Acquire);
            let ring = self.ring_slot((tail + 1) % n_elements);
            let descriptor = ring.load(Acquire);

            if is_used(descriptor) {
                // Another producer won the race for this ring position.
                std::hint::spin_loop();
                continue;
            }
            if descriptor != 0 && descriptor > tail {
                // The position is free, but its recorded tail is newer than
                // our snapshot: an enqueue/dequeue pair already lapped it.
                std::hint::spin_loop();
                continue;
            }

            let published = ring_descriptor(tail + 1, n_elements, slot);
            if ring.compare_exchange(descriptor, published, AcqRel, Acquire).is_ok() {
                // tail only ever advances; 64 bits will not wrap in the
                // lifetime of any deployment.
                header.tail.fetch_add(1, AcqRel);
                return;
            }
        }
    }

    /// Capacity in slots.
    pub fn capacity(&self) -> usize {
        self.header().n_elements as usize
    }

    /// Payload bytes per slot, after the minimum-size raise.
    pub fn element_size(&self) -> usize {
        self.header().element_size as usize
    }

    /// Published elements currently in the FIFO. Exact only at quiescent
    /// points.
    pub fn len(&self) -> usize {
        let header = self.header();
        let head = header.head.load(Acquire);
        let tail = header.tail.load(Acquire);
        (tail + 1).saturating_sub(head) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Current dequeue cursor, for diagnostics. Monotonically non-decreasing.
    pub fn head(&self) -> u64 {
        self.header().head.load(Acquire)
    }

    /// Current enqueue cursor, for diagnostics. Monotonically non-decreasing.
    pub fn tail(&self) -> u64 {
        self.header().tail.load(Acquire)
    }

    /// Slots reachable from `free_head`. Only meaningful while no other
    /// thread is mutating the queue; the stress tests use it to check slot
    /// conservation between phases.
    pub fn free_len(&self) -> usize {
        let n_elements = self.capacity();
        let mut count = 0;
        let mut current = self.header().free_head.load(Acquire);
        while current != 0 && count <= n_elements {
            count += 1;
            current = self.slot_link(descriptor_slot(current)).load(Acquire);
        }
        count
    }

    /// Ring positions whose descriptor has the USED bit set. Only meaningful
    /// at quiescent points.
    pub fn queued_len(&self) -> usize {
        (0..self.header().n_elements)
            .filter(|&i| is_used(self.ring_slot(i).load(Acquire)))
            .count()
    }

    #[inline]
    fn header(&self) -> &QueueHeader {
        unsafe { self.header.as_ref() }
    }

    #[inline]
    fn stride(&self) -> usize {
        raw_elem_size(self.header().element_size as usize)
    }

    #[inline]
    fn arena_start(&self) -> *mut u8 {
        unsafe { (self.header.as_ptr() as *mut u8).add(size_of::<QueueHeader>()) }
    }

    #[inline]
    fn slot_ptr(&self, slot: u32) -> *mut u8 {
        unsafe { self.arena_start().add(slot as usize * self.stride()) }
    }

    /// The first 8 bytes of a slot, viewed as the intrusive free-list link.
    #[inline]
    fn slot_link(&self, slot: u32) -> &AtomicU64 {
        unsafe { &*(self.slot_ptr(slot) as *const AtomicU64) }
    }

    /// Ring descriptor at `position` (already reduced mod capacity).
    #[inline]
    fn ring_slot(&self, position: u64) -> &AtomicU64 {
        let header = self.header();
        let ring_start = unsafe {
            self.arena_start()
                .add(header.n_elements as usize * self.stride()) as *const AtomicU64
        };
        unsafe { &*ring_start.add(position as usize) }
    }

    #[inline]
    fn slot_index_of(&self, data: *const u8) -> u32 {
        let offset = data as usize - self.arena_start() as usize;
        debug_assert_eq!(offset % self.stride(), 0);
        let slot = (offset / self.stride()) as u32;
        debug_assert!((slot as u64) < self.header().n_elements);
        slot
    }

    #[inline]
    unsafe fn element_at(&self, slot: u32) -> Element<'_> {
        Element {
            data: NonNull::new_unchecked(self.slot_ptr(slot)),
            len: self.header().element_size as usize,
            _queue: PhantomData,
        }
    }

    /// Rebuild an element guard from a raw payload pointer previously handed
    /// out by [`LfQueue::get`] or [`LfQueue::dequeue`].
    ///
    /// # Safety
    /// `data` must be a payload pointer obtained from this queue whose slot
    /// is currently held by the caller.
    pub(crate) unsafe fn element_from_raw(&self, data: *mut u8) -> Element<'_> {
        debug_assert!((self.slot_index_of(data) as u64) < self.header().n_elements);
        Element {
            data: NonNull::new_unchecked(data),
            len: self.header().element_size as usize,
            _queue: PhantomData,
        }
    }
}

impl Drop for LfQueue {
    fn drop(&mut self) {
        if let Some(layout) = self.owned {
            if self.header().owns_memory {
                unsafe { dealloc(self.header.as_ptr() as *mut u8, layout) };
            }
        }
    }
}

impl fmt::Debug for LfQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let header = self.header();
        f.debug_struct("LfQueue")
            .field("capacity", &header.n_elements)
            .field("element_size", &header.element_size)
            .field("head", &header.head.load(Relaxed))
            .field("tail", &header.tail.load(Relaxed))
            .field("owns_memory", &header.owns_memory)
            .finish_non_exhaustive()
    }
}

fn validate_config(n_elements: usize, element_size: usize) -> io::Result<()> {
    if n_elements == 0 || element_size == 0 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "queue capacity and element size must be non-zero",
        ));
    }
    if n_elements as u64 > MAX_ELEMENTS {
        // Slot indices must fit the low 32 descriptor bits.
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("queue capacity {n_elements} exceeds the 32-bit slot index range"),
        ));
    }
    Ok(())
}
