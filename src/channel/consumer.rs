use std::sync::Arc;
use std::time::{Duration, Instant};

use super::LEN_PREFIX;
use crate::core::ShmQueue;

/// Receives byte messages from a shared-memory queue.
pub struct Consumer {
    shm: Arc<ShmQueue>,
}

impl Consumer {
    pub(crate) fn new(shm: Arc<ShmQueue>) -> Self {
        Self { shm }
    }

    /// Receives a message if one is queued. Never blocks.
    pub fn receive(&self) -> Option<Vec<u8>> {
        let queue = self.shm.queue();
        let element = queue.dequeue()?;

        let slot = element.as_slice();
        let mut len_bytes = [0u8; LEN_PREFIX];
        len_bytes.copy_from_slice(&slot[..LEN_PREFIX]);
        // Clamp so a corrupt prefix cannot read past the slot.
        let len = (u32::from_le_bytes(len_bytes) as usize).min(slot.len() - LEN_PREFIX);
        let payload = slot[LEN_PREFIX..LEN_PREFIX + len].to_vec();

        queue.put(element);
        Some(payload)
    }

    /// Receives a message, waiting up to `timeout`.
    ///
    /// The queue itself never blocks; this loop is the caller-side retry
    /// policy, sleeping in small steps to keep CPU usage down.
    pub fn receive_timeout(&self, timeout: Duration) -> Option<Vec<u8>> {
        let start = Instant::now();
        loop {
            if let Some(payload) = self.receive() {
                return Some(payload);
            }
            let elapsed = start.elapsed();
            if elapsed >= timeout {
                return None;
            }
            let remaining = timeout - elapsed;
            std::thread::sleep(remaining.min(Duration::from_millis(1)));
        }
    }

    /// Receives a message, spinning until one arrives.
    pub fn receive_blocking(&self) -> Vec<u8> {
        loop {
            if let Some(payload) = self.receive() {
                return payload;
            }
            std::hint::spin_loop();
            std::thread::yield_now();
        }
    }

    /// The shared-memory region backing this consumer.
    pub fn shm(&self) -> &ShmQueue {
        &self.shm
    }
}
