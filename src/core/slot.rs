//! # Work-queue slots.
//!
//! A [`Slot`] is one unit of work for the pool: either an agent owed one
//! consume cycle, or the *sentinel* that tells the worker taking it to exit.

use crate::agents::AgentRef;

/// One entry of the scheduler's work queue.
#[derive(Clone, Debug)]
pub struct Slot {
    agent: Option<AgentRef>,
}

impl Slot {
    /// A slot asking for one consume cycle of `agent`.
    pub fn for_agent(agent: AgentRef) -> Self {
        Self { agent: Some(agent) }
    }

    /// The shutdown marker; one is queued per worker on `stop()`.
    pub fn sentinel() -> Self {
        Self { agent: None }
    }

    /// True for the shutdown marker.
    pub fn is_sentinel(&self) -> bool {
        self.agent.is_none()
    }

    /// The agent carried by this slot.
    pub fn agent(&self) -> Option<&AgentRef> {
        self.agent.as_ref()
    }

    /// Consumes the slot, returning its agent (`None` for the sentinel).
    pub fn into_agent(self) -> Option<AgentRef> {
        self.agent
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Agent;

    #[test]
    fn test_sentinel_and_agent_slots() {
        assert!(Slot::sentinel().is_sentinel());
        assert!(Slot::sentinel().into_agent().is_none());

        let slot = Slot::for_agent(Agent::builder("a").pooled());
        assert!(!slot.is_sentinel());
        assert_eq!(slot.agent().map(|a| a.name()), Some("a"));
    }
}
