use std::io;
use std::sync::Arc;

use lazy_static::lazy_static;
use parking_lot::Mutex;

use super::{Consumer, Producer};
use crate::core::ShmQueue;

lazy_static! {
    // Serializes attach-or-create so two threads building producers for the
    // same name cannot both fall into the create path.
    static ref BUILD_LOCK: Mutex<()> = Mutex::new(());
}

/// Builder for message endpoints over a named shared-memory queue.
pub struct QueueBuilder {
    name: String,
    capacity: usize,
    element_size: usize,
}

impl QueueBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            capacity: 1024,
            element_size: 256,
        }
    }

    /// Number of slots in the queue.
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Slot size in bytes; the largest sendable message is 4 bytes smaller.
    pub fn with_element_size(mut self, element_size: usize) -> Self {
        self.element_size = element_size;
        self
    }

    /// Attach to the named queue, creating and formatting it if it does not
    /// exist yet.
    pub fn build_producer(self) -> io::Result<Producer> {
        let _guard = BUILD_LOCK.lock();
        let shm = match ShmQueue::attach(&self.name, self.capacity, self.element_size) {
            Ok(shm) => shm,
            Err(_) => ShmQueue::create(&self.name, self.capacity, self.element_size)?,
        };
        Ok(Producer::new(Arc::new(shm)))
    }

    /// Attach to an existing named queue.
    pub fn build_consumer(self) -> io::Result<Consumer> {
        let shm = ShmQueue::attach(&self.name, self.capacity, self.element_size)?;
        Ok(Consumer::new(Arc::new(shm)))
    }
}
