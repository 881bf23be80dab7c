//! # AgentGroup: agents registered under one name.
//!
//! A group keeps its agents in registration order; an agent's index is its
//! zero-based position. A *unique* group admits exactly one agent.
//!
//! Groups are cheap to clone (a vector of `Arc`s). The router hands out clones
//! so bulk operations run without holding the router lock.

use tracing::{debug, error};

use crate::agents::AgentRef;
use crate::error::{AgentError, RouterError};

/// Ordered, named collection of agents.
#[derive(Clone, Debug)]
pub struct AgentGroup {
    name: String,
    unique: bool,
    agents: Vec<AgentRef>,
}

impl AgentGroup {
    /// Creates an empty group.
    pub fn new(name: impl Into<String>, unique: bool) -> Self {
        Self {
            name: name.into(),
            unique,
            agents: Vec::new(),
        }
    }

    /// Group name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// True if the group admits a single agent.
    pub fn is_unique(&self) -> bool {
        self.unique
    }

    /// Appends `agent`, assigns its index and returns it.
    ///
    /// Fails with [`RouterError::NotUnique`] if the group is unique and already populated.
    pub fn add(&mut self, agent: &AgentRef) -> Result<usize, RouterError> {
        if self.unique && !self.agents.is_empty() {
            return Err(RouterError::NotUnique {
                name: self.name.clone(),
            });
        }
        let index = self.agents.len();
        agent.set_index(index);
        self.agents.push(agent.clone());
        Ok(index)
    }

    /// Agent at `index`, if any.
    pub fn get(&self, index: usize) -> Option<&AgentRef> {
        self.agents.get(index)
    }

    /// Number of agents.
    pub fn len(&self) -> usize {
        self.agents.len()
    }

    /// True if the group holds no agent.
    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    /// Agents in index order.
    pub fn agents(&self) -> &[AgentRef] {
        &self.agents
    }

    /// Starts every agent; failures are logged and the first one is returned.
    pub fn start_all(&self) -> Result<(), AgentError> {
        let mut first = None;
        for agent in &self.agents {
            match agent.start() {
                Ok(()) => {}
                Err(err @ AgentError::RouterDown { .. }) => {
                    debug!(agent = %self.name, index = agent.index(), "not started: {err}");
                    first.get_or_insert(err);
                }
                Err(err) => {
                    error!(agent = %self.name, index = agent.index(), error = %err, "failed to start agent");
                    first.get_or_insert(err);
                }
            }
        }
        first.map_or(Ok(()), Err)
    }

    /// Stops every started agent with the default cause.
    pub fn stop_all(&self) {
        for agent in &self.agents {
            if agent.is_started() {
                if let Err(err) = agent.stop() {
                    error!(agent = %self.name, index = agent.index(), error = %err, "failed to stop agent");
                }
            }
        }
    }

    /// Stops every started agent with `cause`.
    pub fn stop_with_cause(&self, cause: &str) {
        for agent in &self.agents {
            if agent.is_started() {
                if let Err(err) = agent.stop_with_cause(cause) {
                    error!(agent = %self.name, index = agent.index(), error = %err, "failed to stop agent");
                }
            }
        }
    }
}
