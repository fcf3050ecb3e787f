//! # Shared Hand-off Queue
//!
//! A small bounded FIFO used to pass frequency estimates from the analysis
//! thread to any number of polling consumers. The queue is deliberately lossy:
//! `put` evicts the oldest element instead of blocking when full, and `get`
//! returns immediately instead of waiting for data. Staleness is acceptable,
//! starvation is not.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

/// Default number of elements the queue holds before evicting the oldest.
pub const DEFAULT_QUEUE_CAPACITY: usize = 8;

/// Fixed-capacity FIFO shared between one producer and polling consumers.
///
/// All access goes through a mutex held only for the deque mutation itself;
/// neither `put` nor `get` ever blocks waiting for the other side.
#[derive(Debug)]
pub struct SharedQueue<T> {
    elements: Mutex<VecDeque<T>>,
    capacity: usize,
}

impl<T> SharedQueue<T> {
    /// Creates a queue with [`DEFAULT_QUEUE_CAPACITY`].
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_QUEUE_CAPACITY)
    }

    /// Creates a queue holding at most `capacity` elements (minimum 1).
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            elements: Mutex::new(VecDeque::with_capacity(capacity + 1)),
            capacity,
        }
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<T>> {
        // A poisoned lock only records that some other thread panicked while
        // holding it; the deque itself is still in a valid state.
        self.elements.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Appends `element` to the tail. If the queue is full, the oldest
    /// element is dropped. Never blocks, never fails.
    pub fn put(&self, element: T) {
        let mut elements = self.lock();
        elements.push_back(element);
        if elements.len() > self.capacity {
            elements.pop_front();
        }
    }

    /// Removes and returns the oldest element, or `None` if the queue is
    /// empty. Never blocks.
    pub fn get(&self) -> Option<T> {
        self.lock().pop_front()
    }

    /// Number of queued elements.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether the queue currently holds no elements.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

impl<T> Default for SharedQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn get_on_empty_queue_returns_none() {
        let queue: SharedQueue<f32> = SharedQueue::new();
        assert_eq!(queue.get(), None);
        assert!(queue.is_empty());
    }

    #[test]
    fn put_and_get_are_fifo() {
        let queue = SharedQueue::new();
        queue.put(1);
        queue.put(2);
        queue.put(3);
        assert_eq!(queue.get(), Some(1));
        assert_eq!(queue.get(), Some(2));
        assert_eq!(queue.get(), Some(3));
        assert_eq!(queue.get(), None);
    }

    #[test]
    fn overflow_evicts_the_oldest_elements() {
        let queue = SharedQueue::with_capacity(8);
        for i in 0..13 {
            queue.put(i);
        }
        assert_eq!(queue.len(), 8);
        // The last 8 of the 13 pushed elements survive, in original order.
        for expected in 5..13 {
            assert_eq!(queue.get(), Some(expected));
        }
        assert_eq!(queue.get(), None);
    }

    #[test]
    fn cross_thread_order_is_preserved() {
        let queue = Arc::new(SharedQueue::with_capacity(8));
        let producer = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || {
                for i in 0..1000_i32 {
                    queue.put(i);
                }
            })
        };

        // Elements may be dropped under pressure but must never reorder.
        let mut last = -1;
        loop {
            while let Some(value) = queue.get() {
                assert!(value > last, "observed {value} after {last}");
                last = value;
            }
            if producer.is_finished() {
                break;
            }
        }
        while let Some(value) = queue.get() {
            assert!(value > last);
            last = value;
        }
        producer.join().unwrap();
    }
}
