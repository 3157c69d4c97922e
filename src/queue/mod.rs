mod queue;
mod queue_impl;

pub mod layout;

pub use layout::required_memory;
pub use queue::{Element, LfQueue}; // re-export for stable path
