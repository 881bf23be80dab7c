//! # Event bus.
//!
//! [`Bus`] wraps a [`tokio::sync::broadcast`] channel. Agents, the router and
//! pool workers publish from plain OS threads; the runtime's subscriber listener
//! is the usual (and only) receiver.
//!
//! ```text
//! agent threads ──┐
//! pool workers  ──┼── publish ──► Bus ──► listener (Runtime::run) ──► SubscriberSet
//! router        ──┘
//! ```
//!
//! Publishing never blocks and never fails: with no receiver the event is
//! simply lost, and a receiver that falls more than `capacity` events behind
//! sees `RecvError::Lagged` and skips ahead.

use tokio::sync::broadcast;

use super::event::Event;

/// Cloneable handle to the runtime's event channel.
#[derive(Clone, Debug)]
pub struct Bus {
    tx: broadcast::Sender<Event>,
}

impl Bus {
    /// Creates a bus keeping the last `capacity` events (at least 1).
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Sends `ev` to every live receiver; usable outside a tokio runtime.
    pub fn publish(&self, ev: Event) {
        let _ = self.tx.send(ev);
    }

    /// New receiver observing events published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }

    /// Number of live receivers.
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventKind;

    #[test]
    fn test_publish_from_plain_thread() {
        let bus = Bus::new(0);
        let mut rx = bus.subscribe();
        let publisher = bus.clone();
        std::thread::spawn(move || publisher.publish(Event::new(EventKind::AllStopped)))
            .join()
            .unwrap();

        let ev = rx.try_recv().unwrap();
        assert_eq!(ev.kind, EventKind::AllStopped);
        assert_eq!(bus.receiver_count(), 1);
    }
}
