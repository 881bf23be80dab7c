//! # Subscriber trait.
//!
//! A [`Subscribe`] implementation receives every runtime event on its own tokio
//! task, fed by a bounded queue owned by the
//! [`SubscriberSet`](crate::subscribers::SubscriberSet). A slow subscriber only
//! delays itself: agents, pool workers and other subscribers never wait on it.
//! When its queue is full the event is dropped for it and `SubscriberOverflow`
//! is published.

use async_trait::async_trait;

use crate::events::Event;

/// Receives runtime events.
#[async_trait]
pub trait Subscribe: Send + Sync + 'static {
    /// Handles one event. Runs on the subscriber's task; don't block the thread.
    async fn on_event(&self, event: &Event);

    /// Name reported in overflow and panic events.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Capacity of this subscriber's queue.
    fn queue_capacity(&self) -> usize {
        1024
    }
}
