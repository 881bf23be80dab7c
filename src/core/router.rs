//! # Router: agent directory, running-count barrier and fatal broadcast.
//!
//! The [`Router`] maps group names to [`AgentGroup`]s, counts running agents and
//! decides (through an [`ErrorPolicy`]) whether a reported failure stops everyone.
//!
//! ## Running-count barrier
//! ```text
//! agent.start() ──► signal_agent_start ──► running += 1
//! agent.stop()  ──► signal_agent_stop  ──► running -= 1 ──► 0? ──► up = false
//!                                                              └─► all_stopped.cancel()
//! wait_all_stopped() ◄──────────────────────────────────────────────┘
//! ```
//!
//! ## Rules
//! - Once the count returns to zero, or a fatal error is reported, the router
//!   is **down**: further registrations and starts fail with [`RouterError::Down`].
//! - [`Router::start_all`] holds one extra count while it starts agents, so an
//!   agent stopping itself during startup cannot take the router down before
//!   the remaining agents were started.
//! - The router lock is never held while calling into an agent. Bulk operations
//!   snapshot the groups first, so agents registered concurrently with a fatal
//!   broadcast may be missed by it.
//! - Lock order is agent → router: agents call in while holding their own
//!   lifecycle lock, the router never calls out while holding its own.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::agents::{Agent, AgentRef};
use crate::core::group::AgentGroup;
use crate::error::{AgentError, RouterError};
use crate::events::{Bus, Event, EventKind};
use crate::policies::ErrorPolicy;

struct RouterState {
    groups: HashMap<String, AgentGroup>,
    running: usize,
    // Successful starts since creation; tells start_all whether its hold
    // covered any agent.
    starts: usize,
    up: bool,
}

/// Agent directory shared by every agent of a runtime.
pub struct Router {
    me: Weak<Router>,
    policy: Arc<dyn ErrorPolicy>,
    bus: Bus,
    state: Mutex<RouterState>,
    all_stopped: CancellationToken,
}

impl Router {
    /// Creates a router consulting `policy` on every reported failure.
    pub fn new(policy: Arc<dyn ErrorPolicy>, bus: Bus) -> Arc<Self> {
        Arc::new_cyclic(|me| Self {
            me: me.clone(),
            policy,
            bus,
            state: Mutex::new(RouterState {
                groups: HashMap::new(),
                running: 0,
                starts: 0,
                up: true,
            }),
            all_stopped: CancellationToken::new(),
        })
    }

    fn state(&self) -> MutexGuard<'_, RouterState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Groups ordered by name.
    fn snapshot(&self) -> Vec<AgentGroup> {
        let mut groups: Vec<AgentGroup> = self.state().groups.values().cloned().collect();
        groups.sort_by(|a, b| a.name().cmp(b.name()));
        groups
    }

    /// Event bus shared with agents and the scheduler.
    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    // ---------------------------
    // Directory
    // ---------------------------

    /// Registers `agent` under its name and returns its index in the group.
    ///
    /// With `unique = true` the call fails if the group already exists; a group
    /// created unique rejects any later agent.
    pub fn register_agent(&self, agent: &AgentRef, unique: bool) -> Result<usize, RouterError> {
        let name = agent.name();
        let index = {
            let mut state = self.state();
            if !state.up {
                return Err(RouterError::Down);
            }
            if name.is_empty() {
                return Err(RouterError::EmptyName);
            }
            match state.groups.entry(name.to_string()) {
                Entry::Occupied(_) if unique => {
                    return Err(RouterError::NotUnique {
                        name: name.to_string(),
                    });
                }
                Entry::Occupied(mut slot) => slot.get_mut().add(agent)?,
                Entry::Vacant(slot) => {
                    let mut group = AgentGroup::new(name, unique);
                    let index = group.add(agent)?;
                    slot.insert(group);
                    index
                }
            }
        };

        agent.bind_router(self.me.clone());
        debug!(agent = %name, index, unique, "registered agent");
        self.bus
            .publish(Event::new(EventKind::AgentRegistered).with_agent(name).with_index(index));
        Ok(index)
    }

    /// Removes a whole group; its agents are detached from this router.
    pub fn unregister_agent(&self, name: &str) -> Result<AgentGroup, RouterError> {
        let group = self
            .state()
            .groups
            .remove(name)
            .ok_or_else(|| RouterError::NotRegistered {
                name: name.to_string(),
            })?;
        for agent in group.agents() {
            agent.bind_router(Weak::new());
        }
        Ok(group)
    }

    /// First agent of group `name`.
    pub fn get_agent(&self, name: &str) -> Option<AgentRef> {
        self.get_agent_at(name, 0)
    }

    /// Agent `index` of group `name`.
    pub fn get_agent_at(&self, name: &str, index: usize) -> Option<AgentRef> {
        self.state().groups.get(name)?.get(index).cloned()
    }

    /// Snapshot of group `name`.
    pub fn group(&self, name: &str) -> Option<AgentGroup> {
        self.state().groups.get(name).cloned()
    }

    /// Registered group names, sorted.
    pub fn group_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.state().groups.keys().cloned().collect();
        names.sort();
        names
    }

    /// Number of agents in group `name`.
    pub fn group_len(&self, name: &str) -> Option<usize> {
        self.state().groups.get(name).map(AgentGroup::len)
    }

    /// Every registered agent, grouped by name then index.
    pub fn agents(&self) -> Vec<AgentRef> {
        let mut groups = self.snapshot();
        groups.sort_by(|a, b| a.name().cmp(b.name()));
        groups
            .iter()
            .flat_map(|group| group.agents().iter().cloned())
            .collect()
    }

    /// True if no group is registered.
    pub fn is_empty(&self) -> bool {
        self.state().groups.is_empty()
    }

    // ---------------------------
    // Running-count barrier
    // ---------------------------

    /// Number of started, not yet stopped agents.
    pub fn running(&self) -> usize {
        self.state().running
    }

    /// False once the running count went back to zero or a fatal error was
    /// reported.
    pub fn is_up(&self) -> bool {
        self.state().up
    }

    /// Counts `agent` as running.
    ///
    /// Fails with [`RouterError::Down`] once the count went back to zero.
    ///
    /// # Panics
    /// If `agent` is not registered under its name.
    pub fn signal_agent_start(&self, agent: &Agent) -> Result<(), RouterError> {
        {
            let mut state = self.state();
            assert!(
                Self::is_registered(&state, agent),
                "agent '{}' is not registered with this router",
                agent.name()
            );
            if !state.up {
                return Err(RouterError::Down);
            }
            state.running += 1;
            state.starts += 1;
        }
        self.bus.publish(
            Event::new(EventKind::AgentStarting)
                .with_agent(agent.name())
                .with_index(agent.index()),
        );
        Ok(())
    }

    /// Counts `agent` as stopped; the last one brings the router down.
    ///
    /// # Panics
    /// If `agent` is not registered under its name.
    pub fn signal_agent_stop(&self, agent: &Agent) {
        let all_stopped = {
            let mut state = self.state();
            assert!(
                Self::is_registered(&state, agent),
                "agent '{}' is not registered with this router",
                agent.name()
            );
            Self::count_down(&mut state, true)
        };

        self.bus.publish(
            Event::new(EventKind::AgentStopping)
                .with_agent(agent.name())
                .with_index(agent.index()),
        );
        if all_stopped {
            self.finish();
        }
    }

    /// Drops one from the running count. Returns true when this brought the
    /// router down; `may_finish` false leaves it up at zero.
    fn count_down(state: &mut RouterState, may_finish: bool) -> bool {
        state.running = state.running.saturating_sub(1);
        if state.running == 0 && may_finish {
            state.up = false;
            return true;
        }
        false
    }

    fn finish(&self) {
        debug!("all agents stopped");
        self.all_stopped.cancel();
        self.bus.publish(Event::new(EventKind::AllStopped));
    }

    fn is_registered(state: &RouterState, agent: &Agent) -> bool {
        state
            .groups
            .get(agent.name())
            .is_some_and(|group| group.agents().iter().any(|a| std::ptr::eq(a.as_ref(), agent)))
    }

    /// Waits until the running count has dropped to zero.
    pub async fn wait_all_stopped(&self) {
        self.all_stopped.cancelled().await;
    }

    /// Like [`wait_all_stopped`](Self::wait_all_stopped), bounded by `timeout`.
    /// Returns whether all agents stopped in time.
    pub async fn try_wait_all_stopped(&self, timeout: Duration) -> bool {
        tokio::time::timeout(timeout, self.all_stopped.cancelled())
            .await
            .is_ok()
    }

    /// Token cancelled when the router goes down.
    pub fn all_stopped_token(&self) -> CancellationToken {
        self.all_stopped.clone()
    }

    // ---------------------------
    // Failures and bulk control
    // ---------------------------

    /// Reports a consume-cycle failure of agent `name`.
    ///
    /// If the policy judges it fatal, every started agent is stopped with the
    /// cause `"Fatal error in agent <name>"`.
    pub fn signal_error(&self, name: &str, err: &AgentError) {
        warn!(agent = %name, error = %err, "agent failed");
        self.bus.publish(
            Event::new(EventKind::AgentFailed)
                .with_agent(name)
                .with_reason(err.to_string()),
        );

        if !self.policy.is_fatal(name, err) {
            return;
        }

        error!(agent = %name, error = %err, "fatal error; stopping all agents");
        self.bus.publish(
            Event::new(EventKind::FatalError)
                .with_agent(name)
                .with_reason(err.to_string()),
        );
        let idle = {
            let mut state = self.state();
            let was_up = std::mem::replace(&mut state.up, false);
            was_up && state.running == 0
        };
        if idle {
            self.finish();
        }
        let cause = format!("Fatal error in agent {name}");
        for group in self.snapshot() {
            group.stop_with_cause(&cause);
        }
    }

    /// Starts every registered agent; returns the first failure after trying all.
    ///
    /// Agents left unstarted because a fatal error already brought the router
    /// down are not a failure.
    pub fn start_all(&self) -> Result<(), AgentError> {
        let held = {
            let mut state = self.state();
            if state.up {
                state.running += 1;
                Some(state.starts)
            } else {
                None
            }
        };

        let mut first = None;
        for group in self.snapshot() {
            match group.start_all() {
                Ok(()) => {}
                Err(AgentError::RouterDown { name }) => {
                    debug!(agent = %name, "router went down during start");
                }
                Err(err) => {
                    first.get_or_insert(err);
                }
            }
        }

        if let Some(starts_before) = held {
            let all_stopped = {
                let mut state = self.state();
                let may_finish = state.starts > starts_before || !state.up;
                Self::count_down(&mut state, may_finish)
            };
            if all_stopped {
                self.finish();
            }
        }
        first.map_or(Ok(()), Err)
    }

    /// Stops every started agent with the default cause.
    pub fn stop_all(&self) {
        for group in self.snapshot() {
            group.stop_all();
        }
    }
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state();
        f.debug_struct("Router")
            .field("groups", &state.groups.len())
            .field("running", &state.running)
            .field("up", &state.up)
            .finish_non_exhaustive()
    }
}
