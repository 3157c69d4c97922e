use std::io;
use std::sync::Arc;

use super::LEN_PREFIX;
use crate::core::ShmQueue;

/// Sends byte messages through a shared-memory queue.
///
/// Each message occupies one slot: a u32 little-endian length prefix followed
/// by the payload. Sending never blocks; a full queue surfaces as
/// `WouldBlock` and the caller decides whether to retry.
pub struct Producer {
    shm: Arc<ShmQueue>,
    max_message_size: usize,
}

impl Producer {
    pub(crate) fn new(shm: Arc<ShmQueue>) -> Self {
        let max_message_size = shm.queue().element_size() - LEN_PREFIX;
        Self {
            shm,
            max_message_size,
        }
    }

    /// Sends a message through the queue.
    ///
    /// # Returns
    /// * `Ok(())` if the message was published
    /// * `Err(WouldBlock)` if every slot is currently queued or held
    /// * `Err(InvalidInput)` if the message does not fit a slot
    pub fn send<T: AsRef<[u8]>>(&self, message: T) -> io::Result<()> {
        let message = message.as_ref();
        if message.len() > self.max_message_size {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!(
                    "message too large ({} > {})",
                    message.len(),
                    self.max_message_size
                ),
            ));
        }

        let queue = self.shm.queue();
        let mut element = match queue.get() {
            Some(element) => element,
            None => {
                return Err(io::Error::new(
                    io::ErrorKind::WouldBlock,
                    "queue full: no free slot",
                ))
            }
        };

        let slot = element.as_mut_slice();
        slot[..LEN_PREFIX].copy_from_slice(&(message.len() as u32).to_le_bytes());
        slot[LEN_PREFIX..LEN_PREFIX + message.len()].copy_from_slice(message);
        queue.enqueue(element);
        Ok(())
    }

    /// Returns the maximum message size that can be sent.
    pub fn max_message_size(&self) -> usize {
        self.max_message_size
    }

    /// The shared-memory region backing this producer.
    pub fn shm(&self) -> &ShmQueue {
        &self.shm
    }
}
