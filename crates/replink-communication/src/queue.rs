//! Pending command queue
//!
//! Holds framed lines awaiting transmission. Normal submissions append at
//! the tail; a resend re-inserts at the head so the replayed line goes out
//! before anything queued after it. Internally synchronized: no caller can
//! observe a partially mutated queue.

use crate::codec::OutgoingLine;
use parking_lot::Mutex;
use std::collections::VecDeque;

/// Ordered buffer of not-yet-sent command lines
#[derive(Debug, Default)]
pub struct CommandQueue {
    inner: Mutex<VecDeque<OutgoingLine>>,
}

impl CommandQueue {
    /// Create an empty queue
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a line at the tail (normal submission order)
    pub fn enqueue_tail(&self, line: OutgoingLine) {
        self.inner.lock().push_back(line);
    }

    /// Insert a line at the head so it is transmitted next (resend path)
    pub fn enqueue_head(&self, line: OutgoingLine) {
        self.inner.lock().push_front(line);
    }

    /// Remove and return the next line to send
    pub fn dequeue(&self) -> Option<OutgoingLine> {
        self.inner.lock().pop_front()
    }

    /// Drop all pending lines
    pub fn clear(&self) {
        self.inner.lock().clear();
    }

    /// Number of pending lines
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    /// Whether the queue is empty
    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::encode;

    #[test]
    fn fifo_order_for_tail_enqueues() {
        let queue = CommandQueue::new();
        queue.enqueue_tail(encode(1, "G28"));
        queue.enqueue_tail(encode(2, "G1 X10"));
        queue.enqueue_tail(encode(3, "M105"));

        assert_eq!(queue.len(), 3);
        assert_eq!(queue.dequeue().unwrap().sequence, 1);
        assert_eq!(queue.dequeue().unwrap().sequence, 2);
        assert_eq!(queue.dequeue().unwrap().sequence, 3);
        assert!(queue.dequeue().is_none());
    }

    #[test]
    fn head_enqueue_jumps_the_line() {
        let queue = CommandQueue::new();
        queue.enqueue_tail(encode(2, "G1 X10"));
        queue.enqueue_tail(encode(3, "M105"));
        queue.enqueue_head(encode(1, "G28"));

        assert_eq!(queue.dequeue().unwrap().sequence, 1);
        assert_eq!(queue.dequeue().unwrap().sequence, 2);
    }

    #[test]
    fn clear_drops_everything() {
        let queue = CommandQueue::new();
        queue.enqueue_tail(encode(1, "G28"));
        queue.enqueue_tail(encode(2, "M105"));

        queue.clear();
        assert!(queue.is_empty());
        assert!(queue.dequeue().is_none());
    }
}
