use crossbeam_utils::CachePadded;
use std::mem::size_of;
use std::sync::atomic::{AtomicU32, AtomicU64};

/// A "magic number" identifying a formatted queue region ("LFQREGN1").
pub const QUEUE_MAGIC: u64 = 0x4C46_5152_4547_4E31;

/// The maximal capacity: slot indices are stored in the low 32 bits of a
/// descriptor.
pub const MAX_ELEMENTS: u64 = u32::MAX as u64;

/// Set in a ring descriptor while the slot it references is queued.
pub const USED_BIT: u64 = 0x8000_0000_0000_0000;

/// Low 32 bits of a descriptor: the slot index into the arena.
pub const SLOT_INDEX_MASK: u64 = 0x0000_0000_FFFF_FFFF;

/// Middle 31 bits of a ring descriptor: the queue generation at publish time.
pub const QUEUE_GEN_MASK: u64 = 0x7FFF_FFFF_0000_0000;

/// A descriptor generation ahead of the reader by less than this window is a
/// publication the reader's head snapshot has not caught up with yet; a larger
/// gap can only come from the 31-bit generation field wrapping.
pub const GEN_STALE_WINDOW: i64 = 0x000F_FFFF;

/// The header at offset 0 of every queue region.
///
/// It is `#[repr(C)]` so that the layout is identical for every process
/// mapping the region, and it contains no pointers: the arena and the
/// descriptor ring are located purely by offset arithmetic from the header
/// address, which keeps the whole region position-independent.
///
/// The three contended cursors are wrapped in `CachePadded` so a producer
/// hammering `tail` does not invalidate the cache line a consumer needs for
/// `head`.
#[repr(C)]
pub struct QueueHeader {
    /// Sentinel verified by `attach`.
    pub magic: u64,

    /// Capacity of the queue in slots.
    pub n_elements: u64,

    /// Payload bytes per slot, raised to at least 8 so a free slot can hold
    /// an intrusive free-list descriptor in place of user data.
    pub element_size: u64,

    /// Descriptor of the first free slot, or 0 when the free list is empty.
    /// High 32 bits carry the `mod_count` tag observed at push time.
    pub free_head: CachePadded<AtomicU64>,

    /// Monotonic dequeue cursor; the next ring position to consume is
    /// `head % n_elements`. Starts at 1.
    pub head: CachePadded<AtomicU64>,

    /// Monotonic enqueue cursor; the next ring position to publish is
    /// `(tail + 1) % n_elements`. Starts at 0.
    pub tail: CachePadded<AtomicU64>,

    /// Bumped on every successful free-list pop. Tagging free-list
    /// descriptors with this counter defeats ABA on `free_head`.
    pub mod_count: AtomicU32,

    /// True when the region was allocated by this library and must be
    /// released when the owning handle is dropped.
    pub owns_memory: bool,
}

/// Payload bytes per slot after the minimum-size raise.
#[inline]
pub fn min_element_size(element_size: usize) -> usize {
    element_size.max(size_of::<u64>())
}

/// Arena stride per slot: the raised payload size rounded up to a multiple
/// of 8 so the intrusive link and the ring descriptors stay `AtomicU64`
/// aligned at every slot address.
#[inline]
pub fn raw_elem_size(element_size: usize) -> usize {
    (min_element_size(element_size) + 7) & !7
}

/// Total bytes needed for a queue region: header, arena, descriptor ring.
pub fn required_memory(n_elements: usize, element_size: usize) -> usize {
    size_of::<QueueHeader>()
        + n_elements * raw_elem_size(element_size)
        + n_elements * size_of::<u64>()
}

/// Pack a ring descriptor: USED bit, queue generation of the publishing lap,
/// slot index.
#[inline]
pub fn ring_descriptor(next_tail: u64, n_elements: u64, slot: u32) -> u64 {
    let queue_gen = next_tail / n_elements;
    USED_BIT | ((queue_gen << 32) & QUEUE_GEN_MASK) | slot as u64
}

/// Pack a free-list descriptor: `mod_count` tag in the high 32 bits, slot
/// index in the low 32.
#[inline]
pub fn free_descriptor(mod_count: u32, slot: u32) -> u64 {
    ((mod_count as u64) << 32) | slot as u64
}

#[inline]
pub fn descriptor_slot(descriptor: u64) -> u32 {
    (descriptor & SLOT_INDEX_MASK) as u32
}

#[inline]
pub fn descriptor_gen(descriptor: u64) -> u64 {
    (descriptor & QUEUE_GEN_MASK) >> 32
}

#[inline]
pub fn is_used(descriptor: u64) -> bool {
    descriptor & USED_BIT != 0
}
