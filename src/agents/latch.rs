//! # One-shot blocking latch.
//!
//! Released exactly once; every wait after the release returns immediately.
//! Built on channel disconnection: releasing drops the only sender, which wakes
//! the blocked receiver with `Disconnected`.
//!
//! Waiters are serialized on the receiver, so a second concurrent
//! `wait_timeout` may wait longer than asked while the first one holds it.
//! The runtime only ever has one joiner per agent.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub(crate) struct Latch {
    released: AtomicBool,
    tx: Mutex<Option<Sender<()>>>,
    rx: Mutex<Receiver<()>>,
}

impl Latch {
    pub(crate) fn new() -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            released: AtomicBool::new(false),
            tx: Mutex::new(Some(tx)),
            rx: Mutex::new(rx),
        }
    }

    pub(crate) fn release(&self) {
        self.released.store(true, Ordering::SeqCst);
        self.tx
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
    }

    pub(crate) fn is_released(&self) -> bool {
        self.released.load(Ordering::SeqCst)
    }

    pub(crate) fn wait(&self) {
        if self.is_released() {
            return;
        }
        let rx = self.rx.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let _ = rx.recv();
    }

    /// Returns `true` if the latch was released within `timeout`.
    pub(crate) fn wait_timeout(&self, timeout: Duration) -> bool {
        if self.is_released() {
            return true;
        }
        let rx = self.rx.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        match rx.recv_timeout(timeout) {
            Err(RecvTimeoutError::Disconnected) => true,
            Err(RecvTimeoutError::Timeout) | Ok(()) => self.is_released(),
        }
    }
}

/// Releases the latch when dropped, including during a panic unwind.
pub(crate) struct ReleaseOnDrop(pub(crate) Arc<Latch>);

impl Drop for ReleaseOnDrop {
    fn drop(&mut self) {
        self.0.release();
    }
}
