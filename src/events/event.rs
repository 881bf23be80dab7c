//! # Runtime events emitted by agents, the router and the scheduler.
//!
//! The [`EventKind`] enum classifies event types across four categories:
//! - **Agent lifecycle**: registration, start, stop, failure, dropped messages
//! - **Router**: fatal broadcast and the all-stopped completion signal
//! - **Worker pool**: scheduler start/stop, escaped worker panics
//! - **Runtime/subscribers**: shutdown requests, subscriber overflow/panic
//!
//! The [`Event`] struct carries metadata such as timestamps, agent name and
//! index, worker id and reason.
//!
//! Events are published from many threads at once; `seq` comes from one
//! process-wide counter, so sorting by it recovers publication order.
//!
//! ## Example
//! ```rust
//! use agentvisor::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::AgentFailed)
//!     .with_agent("pinger")
//!     .with_index(2)
//!     .with_reason("boom");
//!
//! assert_eq!(ev.kind, EventKind::AgentFailed);
//! assert_eq!(ev.agent.as_deref(), Some("pinger"));
//! assert_eq!(ev.index, Some(2));
//! assert_eq!(ev.reason.as_deref(), Some("boom"));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::SystemTime;

static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// What happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // --- subscribers ---
    /// `on_event` panicked. `agent` holds the subscriber name, `reason` the panic text.
    SubscriberPanicked,

    /// An event was dropped for one subscriber (`"full"` or `"closed"` queue).
    SubscriberOverflow,

    // --- runtime ---
    /// `run()` observed an OS signal (`reason`: signal name).
    ShutdownRequested,

    /// The running-agent count reached zero; the router is down.
    AllStopped,

    // === Agent lifecycle events ===
    /// Agent was added to a router group.
    ///
    /// Sets:
    /// - `agent`: group name
    /// - `index`: position inside the group
    AgentRegistered,

    /// Agent was counted as running (`start()` succeeded its router signal).
    ///
    /// Sets:
    /// - `agent`, `index`
    AgentStarting,

    /// Agent was counted as stopped (`stop()` or a fatal broadcast).
    ///
    /// Sets:
    /// - `agent`, `index`
    AgentStopping,

    /// Agent reported a consume-cycle failure to the router.
    ///
    /// Sets:
    /// - `agent`: agent name
    /// - `reason`: error message
    AgentFailed,

    /// A message arrived after the agent published `STOPPED` and was discarded.
    ///
    /// Sets:
    /// - `agent`, `index`
    /// - `reason`: message type name
    MessageDropped,

    /// The error policy judged a failure fatal; every agent is being stopped.
    ///
    /// Sets:
    /// - `agent`: the failing agent
    /// - `reason`: error message
    FatalError,

    // === Worker pool events ===
    /// Worker pool threads were started.
    ///
    /// Sets:
    /// - `reason`: number of workers
    SchedulerStarted,

    /// Worker pool was asked to stop (one sentinel per worker queued).
    SchedulerStopping,

    /// A panic escaped a worker; the pool is being torn down.
    ///
    /// Sets:
    /// - `worker`: worker id
    /// - `reason`: panic message
    WorkerFailed,
}

impl EventKind {
    /// Returns a short stable label (kebab-case) for logs.
    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::SubscriberPanicked => "subscriber-panicked",
            EventKind::SubscriberOverflow => "subscriber-overflow",
            EventKind::ShutdownRequested => "shutdown-requested",
            EventKind::AllStopped => "all-stopped",
            EventKind::AgentRegistered => "agent-registered",
            EventKind::AgentStarting => "agent-starting",
            EventKind::AgentStopping => "agent-stopping",
            EventKind::AgentFailed => "agent-failed",
            EventKind::MessageDropped => "message-dropped",
            EventKind::FatalError => "fatal-error",
            EventKind::SchedulerStarted => "scheduler-started",
            EventKind::SchedulerStopping => "scheduler-stopping",
            EventKind::WorkerFailed => "worker-failed",
        }
    }
}

/// One runtime event. Which optional fields are set depends on `kind`.
#[derive(Debug, Clone)]
pub struct Event {
    /// Process-wide publication order.
    pub seq: u64,
    /// When the event was built.
    pub at: SystemTime,
    /// What happened.
    pub kind: EventKind,
    /// Agent (group) name, if applicable.
    pub agent: Option<Arc<str>>,
    /// Agent index inside its group.
    pub index: Option<usize>,
    /// Worker id inside the pool.
    pub worker: Option<usize>,
    /// Free-form detail: error text, signal name, message type...
    pub reason: Option<Arc<str>>,
}

impl Event {
    /// Stamps a new event of `kind`.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            agent: None,
            index: None,
            worker: None,
            reason: None,
        }
    }

    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Attaches an agent name.
    #[inline]
    pub fn with_agent(mut self, agent: impl Into<Arc<str>>) -> Self {
        self.agent = Some(agent.into());
        self
    }

    /// Attaches an agent index.
    #[inline]
    pub fn with_index(mut self, index: usize) -> Self {
        self.index = Some(index);
        self
    }

    /// Attaches a worker id.
    #[inline]
    pub fn with_worker(mut self, worker: usize) -> Self {
        self.worker = Some(worker);
        self
    }

    /// `SubscriberOverflow` for `subscriber`.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::new(EventKind::SubscriberOverflow)
            .with_agent(subscriber)
            .with_reason(format!("subscriber={subscriber} reason={reason}"))
    }

    /// `SubscriberPanicked` for `subscriber`.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::new(EventKind::SubscriberPanicked)
            .with_agent(subscriber)
            .with_reason(info)
    }

    /// True for events about subscribers rather than agents.
    pub fn is_subscriber_event(&self) -> bool {
        matches!(
            self.kind,
            EventKind::SubscriberOverflow | EventKind::SubscriberPanicked
        )
    }

    #[inline]
    pub fn is_subscriber_overflow(&self) -> bool {
        self.kind == EventKind::SubscriberOverflow
    }

    #[inline]
    pub fn is_subscriber_panic(&self) -> bool {
        self.kind == EventKind::SubscriberPanicked
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seq_is_monotonic() {
        let a = Event::new(EventKind::AllStopped);
        let b = Event::new(EventKind::AllStopped);
        assert!(b.seq > a.seq);
    }

    #[test]
    fn test_subscriber_helpers() {
        let ev = Event::subscriber_overflow("audit", "full");
        assert!(ev.is_subscriber_overflow());
        assert_eq!(ev.agent.as_deref(), Some("audit"));
        assert_eq!(ev.reason.as_deref(), Some("subscriber=audit reason=full"));

        let ev = Event::subscriber_panicked("audit", "boom".into());
        assert!(ev.is_subscriber_panic());
        assert!(ev.is_subscriber_event());
        assert!(!Event::new(EventKind::AgentFailed).is_subscriber_event());
        assert_eq!(EventKind::WorkerFailed.as_str(), "worker-failed");
    }
}
