//! # Agents: mailbox, handlers, lifecycle and execution strategies.
//!
//! - [`Agent`] / [`AgentBuilder`] own the mailbox and the consume cycle.
//! - [`AgentStatus`] is the `INIT → RUNNING → STOPPED` state machine.
//! - [`InitAgent`] / [`StopAgent`] are the two runtime-reserved messages.
//! - [`Execution`] with [`Dedicated`] and [`Pooled`] decides who runs cycles.

mod agent;
mod handler;
pub(crate) mod latch;
mod message;
mod status;
mod strategy;

pub use agent::{Agent, AgentBuilder, AgentRef};
pub use message::{InitAgent, StopAgent};
pub use status::AgentStatus;
pub use strategy::{Dedicated, Execution, Pooled};
