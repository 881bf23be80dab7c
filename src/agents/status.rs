//! # Agent lifecycle status.
//!
//! ```text
//! INIT ──(Init message)──► RUNNING ──(Stop message / fault)──► STOPPED
//!   └──────────────────(Stop message / fault)─────────────────────┘
//! ```
//!
//! `STOPPED` is terminal. An agent keeps two copies of its status:
//! the raw status (what `status()` reports, guarded by a mutex) and the
//! published status (an atomic read by the consume cycle to drop messages
//! without taking a lock).

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

/// The three possible states of an agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum AgentStatus {
    /// Created, not yet initialized by its Init message.
    Init = 0,
    /// Init message consumed; handlers are live.
    Running = 1,
    /// Terminal.
    Stopped = 2,
}

impl AgentStatus {
    /// Returns a short stable label for logs/events.
    pub fn as_str(self) -> &'static str {
        match self {
            AgentStatus::Init => "init",
            AgentStatus::Running => "running",
            AgentStatus::Stopped => "stopped",
        }
    }

    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => AgentStatus::Init,
            1 => AgentStatus::Running,
            _ => AgentStatus::Stopped,
        }
    }
}

impl fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lock-free status cell (used for the published status).
#[derive(Debug)]
pub(crate) struct AtomicStatus(AtomicU8);

impl AtomicStatus {
    pub(crate) fn new(status: AgentStatus) -> Self {
        Self(AtomicU8::new(status as u8))
    }

    pub(crate) fn load(&self) -> AgentStatus {
        AgentStatus::from_u8(self.0.load(Ordering::Acquire))
    }

    pub(crate) fn store(&self, status: AgentStatus) {
        self.0.store(status as u8, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_atomic_status_roundtrip() {
        let cell = AtomicStatus::new(AgentStatus::Init);
        assert_eq!(cell.load(), AgentStatus::Init);
        cell.store(AgentStatus::Running);
        assert_eq!(cell.load(), AgentStatus::Running);
        cell.store(AgentStatus::Stopped);
        assert_eq!(cell.load(), AgentStatus::Stopped);
    }

    #[test]
    fn test_labels() {
        assert_eq!(AgentStatus::Running.to_string(), "running");
        assert_eq!(AgentStatus::Stopped.as_str(), "stopped");
    }
}
