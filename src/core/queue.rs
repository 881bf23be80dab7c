//! # Blocking FIFO shared by mailboxes and the scheduler's work queue.
//!
//! [`BlockingQueue`] wraps a [`std::sync::mpsc`] channel and keeps both ends,
//! so any thread holding a reference can `put` and `take`.
//!
//! ## Rules
//! - **Bounded** (`capacity > 0`): `put` blocks while the queue is full. This is
//!   the runtime's only backpressure mechanism.
//! - **Unbounded** (`capacity = 0`): `put` never blocks.
//! - `take` blocks until an item exists. Takers are serialized by a mutex around
//!   the receiver, so the queue is safe for many consumers.
//! - `len` may briefly over-count while a `put` is in flight; it never
//!   under-counts an item that is already queued.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, SyncSender};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use thiserror::Error;

/// The receiving side is gone; the item was not queued.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("queue is closed")]
pub struct QueueClosed;

enum Tx<T> {
    Unbounded(Sender<T>),
    Bounded(SyncSender<T>),
}

/// Many-producer, many-consumer blocking FIFO.
pub struct BlockingQueue<T> {
    tx: Tx<T>,
    rx: Mutex<Receiver<T>>,
    len: AtomicUsize,
    capacity: Option<usize>,
}

impl<T: Send> BlockingQueue<T> {
    /// Creates a queue; `capacity = 0` means unbounded.
    pub fn new(capacity: usize) -> Self {
        if capacity == 0 {
            Self::unbounded()
        } else {
            Self::bounded(capacity)
        }
    }

    /// Creates a queue without backpressure.
    pub fn unbounded() -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            tx: Tx::Unbounded(tx),
            rx: Mutex::new(rx),
            len: AtomicUsize::new(0),
            capacity: None,
        }
    }

    /// Creates a queue holding at most `capacity` items (clamped to 1).
    pub fn bounded(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (tx, rx) = mpsc::sync_channel(capacity);
        Self {
            tx: Tx::Bounded(tx),
            rx: Mutex::new(rx),
            len: AtomicUsize::new(0),
            capacity: Some(capacity),
        }
    }

    /// Appends an item, blocking while a bounded queue is full.
    pub fn put(&self, item: T) -> Result<(), QueueClosed> {
        self.len.fetch_add(1, Ordering::SeqCst);
        let sent = match &self.tx {
            Tx::Unbounded(tx) => tx.send(item).map_err(|_| QueueClosed),
            Tx::Bounded(tx) => tx.send(item).map_err(|_| QueueClosed),
        };
        if sent.is_err() {
            self.len.fetch_sub(1, Ordering::SeqCst);
        }
        sent
    }

    /// Removes the oldest item, blocking until one exists.
    ///
    /// Returns `None` only if the channel is disconnected, which cannot happen
    /// while the queue is alive (it owns its own sender).
    pub fn take(&self) -> Option<T> {
        let item = self.receiver().recv().ok()?;
        self.len.fetch_sub(1, Ordering::SeqCst);
        Some(item)
    }

    /// Like [`take`](Self::take) but gives up after `timeout`.
    pub fn take_timeout(&self, timeout: Duration) -> Option<T> {
        match self.receiver().recv_timeout(timeout) {
            Ok(item) => {
                self.len.fetch_sub(1, Ordering::SeqCst);
                Some(item)
            }
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Removes the oldest item if one is immediately available.
    pub fn try_take(&self) -> Option<T> {
        let item = self.receiver().try_recv().ok()?;
        self.len.fetch_sub(1, Ordering::SeqCst);
        Some(item)
    }

    /// Number of queued items (see module rules for accuracy).
    pub fn len(&self) -> usize {
        self.len.load(Ordering::SeqCst)
    }

    /// True if no item is queued.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Capacity of a bounded queue, `None` if unbounded.
    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    fn receiver(&self) -> MutexGuard<'_, Receiver<T>> {
        self.rx.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_fifo_order() {
        let q = BlockingQueue::unbounded();
        for i in 0..5 {
            q.put(i).unwrap();
        }
        assert_eq!(q.len(), 5);
        let got: Vec<i32> = (0..5).map(|_| q.take().unwrap()).collect();
        assert_eq!(got, vec![0, 1, 2, 3, 4]);
        assert!(q.is_empty());
    }

    #[test]
    fn test_zero_capacity_means_unbounded() {
        let q: BlockingQueue<u8> = BlockingQueue::new(0);
        assert_eq!(q.capacity(), None);
        let q: BlockingQueue<u8> = BlockingQueue::new(3);
        assert_eq!(q.capacity(), Some(3));
    }

    #[test]
    fn test_bounded_put_blocks_until_take() {
        let q = Arc::new(BlockingQueue::bounded(1));
        q.put(1).unwrap();

        let producer = {
            let q = q.clone();
            thread::spawn(move || q.put(2).unwrap())
        };

        thread::sleep(Duration::from_millis(50));
        assert!(!producer.is_finished(), "second put must block on a full queue");

        assert_eq!(q.take(), Some(1));
        producer.join().unwrap();
        assert_eq!(q.take(), Some(2));
    }

    #[test]
    fn test_take_timeout_on_empty() {
        let q: BlockingQueue<u8> = BlockingQueue::unbounded();
        assert_eq!(q.take_timeout(Duration::from_millis(10)), None);
        assert_eq!(q.try_take(), None);
    }

    #[test]
    fn test_many_consumers_each_item_once() {
        let q = Arc::new(BlockingQueue::unbounded());
        for i in 0..100u32 {
            q.put(Some(i)).unwrap();
        }
        for _ in 0..4 {
            q.put(None).unwrap();
        }

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let q = q.clone();
                thread::spawn(move || {
                    let mut sum = 0u32;
                    while let Some(Some(v)) = q.take() {
                        sum += v;
                    }
                    sum
                })
            })
            .collect();

        let total: u32 = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(total, (0..100).sum::<u32>());
        assert!(q.is_empty());
    }
}
