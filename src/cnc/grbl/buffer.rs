use std::mem::MaybeUninit;

use ringbuf::LocalRb;
use tracing::warn;

use super::realtime::is_realtime_command;

pub const GRBL_RX_BUFFER_SIZE: usize = 128;

/*
    Mirror of the controller's serial receive buffer. Every line sent occupies its length until
the controller answers it with `ok` or `error`; realtime bytes are consumed out of band and never
count.
*/
pub struct CommandBuffer {
    capacity: usize,
    pending_size: usize,
    pending_lines: LocalRb<usize, Vec<MaybeUninit<usize>>>,
}

impl CommandBuffer {
    pub fn new(capacity: usize) -> Self {
        CommandBuffer {
            capacity,
            pending_size: 0,
            // Each buffered line takes at least one byte, so this many entries always suffice.
            pending_lines: LocalRb::new(capacity.max(1)),
        }
    }
    pub fn would_overflow(&self, command: &[u8]) -> bool {
        !is_realtime_command(command) && self.pending_size + command.len() >= self.capacity
    }
    pub fn register_sent(&mut self, command: &[u8]) {
        if is_realtime_command(command) {
            return;
        }
        if command.is_empty() {
            warn!("empty command never reaches the controller; not recorded");
            return;
        }
        let length = command.len();
        let pushed = self.pending_lines.split_ref().0.push(length);
        match pushed {
            Ok(()) => self.pending_size += length,
            Err(_) => warn!(
                "buffer ledger full ({} lines pending); {} byte line not recorded",
                self.pending_lines.split_ref().1.len(),
                length
            ),
        }
    }
    pub fn register_ack(&mut self) {
        self.pop_received_line();
    }
    pub fn register_error(&mut self) {
        self.pop_received_line();
    }
    /// Forget everything pending, as the controller does on reset.
    pub fn clear(&mut self) {
        self.pending_lines.split_ref().1.clear();
        self.pending_size = 0;
    }
    pub fn pending_size(&self) -> usize {
        self.pending_size
    }
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn pop_received_line(&mut self) {
        let popped = self.pending_lines.split_ref().1.pop();
        match popped {
            Some(length) => self.pending_size -= length,
            None => warn!("acknowledgement received with no line pending"),
        }
    }
    #[cfg(test)]
    fn pending_lengths(&mut self) -> Vec<usize> {
        self.pending_lines.split_ref().1.iter().copied().collect()
    }
}
