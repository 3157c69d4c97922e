//! A lock-free, bounded MPMC queue whose entire state lives in a single
//! contiguous, position-independent memory region: a private heap allocation,
//! or a named POSIX shared-memory mapping for cross-process FIFOs.

pub mod channel;
pub mod core;
pub mod ffi;
pub mod queue;

pub use queue::{Element, LfQueue};
