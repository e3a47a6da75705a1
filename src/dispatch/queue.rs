//! Ordered storage of the commands waiting to be dispatched.

use std::collections::VecDeque;

/// FIFO of byte buffers submitted by the caller. Insertion order is dispatch
/// order; there is no priority and no bound on the depth. Flow control is
/// enforced by the engine, which never pops the next buffer before the board
/// acknowledged the previous line.
#[derive(Debug, Default)]
pub struct CommandQueue {
    buffers: VecDeque<Vec<u8>>,
}

impl CommandQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a buffer to the tail of the queue.
    pub fn submit(&mut self, buffer: Vec<u8>) {
        self.buffers.push_back(buffer);
    }

    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }

    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    /// Remove and return the head of the queue.
    pub fn pop_front(&mut self) -> Option<Vec<u8>> {
        self.buffers.pop_front()
    }

    /// Drop everything, returning how many buffers were discarded.
    pub fn clear(&mut self) -> usize {
        let dropped = self.buffers.len();
        self.buffers.clear();
        dropped
    }
}
