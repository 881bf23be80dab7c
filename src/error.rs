//! Error types used by the agentvisor runtime, its router and its agents.
//!
//! This module defines one error enum per layer:
//!
//! - [`AgentError`]: lifecycle misuse and consume-cycle faults of a single agent.
//! - [`RouterError`]: registration failures reported by the [`Router`](crate::Router).
//! - [`ConfigError`]: invalid runtime configuration (fatal at construction).
//! - [`RuntimeError`]: failures surfaced by the [`Runtime`](crate::Runtime) facade.
//!
//! Every enum provides `as_label` (stable snake_case label for logs/events).
//! [`Fault`] is the shareable error object carried by failing handlers and by
//! error messages submitted to a mailbox.

use std::any::Any;
use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

use thiserror::Error;

/// Boxed error returned by message handlers.
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// # Shareable error object.
///
/// A `Fault` is cheap to clone (it wraps an `Arc`). It plays two roles:
/// - submitted as a message, it makes the receiving agent fail (see
///   [`Agent::submit_fault`](crate::Agent::submit_fault));
/// - it carries the error returned by a failing handler.
///
/// # Example
/// ```
/// use agentvisor::Fault;
///
/// let fault = Fault::msg("disk full");
/// assert_eq!(fault.to_string(), "disk full");
/// ```
#[derive(Clone)]
pub struct Fault(Arc<dyn StdError + Send + Sync + 'static>);

impl Fault {
    /// Wraps any error.
    pub fn new<E>(error: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self(Arc::new(error))
    }

    /// Builds a fault from a plain message.
    pub fn msg(message: impl Into<String>) -> Self {
        let boxed: BoxError = message.into().into();
        Self(Arc::from(boxed))
    }

    /// Returns the wrapped error.
    pub fn inner(&self) -> &(dyn StdError + Send + Sync + 'static) {
        self.0.as_ref()
    }
}

impl From<BoxError> for Fault {
    fn from(error: BoxError) -> Self {
        Self(Arc::from(error))
    }
}

impl fmt::Debug for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.0, f)
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl StdError for Fault {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.0.source()
    }
}

/// # Errors produced by a single agent.
///
/// Lifecycle-misuse variants are returned to the caller and leave the agent
/// untouched. Consume-cycle variants (`AlreadyFailed`, `UnknownMessage`,
/// `Fault`, `Handler`, `Panicked`) are terminal for the agent: they are
/// recorded as its sticky error and reported to the router.
#[non_exhaustive]
#[derive(Error, Debug, Clone)]
pub enum AgentError {
    /// `start()` was called before `setup()`.
    #[error("setup() has not been invoked, cannot start")]
    NotSetup,

    /// `setup()` was called twice.
    #[error("agent has already been setup")]
    AlreadySetup,

    /// `stop()` was called before `start()`.
    #[error("cannot stop agent that has not been started")]
    NotStarted,

    /// The agent is not bound to a live router.
    #[error("agent '{name}' is not registered with a router")]
    NotRegistered {
        /// Agent name.
        name: String,
    },

    /// The router already went down (every agent stopped); nothing can start.
    #[error("cannot start agent '{name}': router is down")]
    RouterDown {
        /// Agent name.
        name: String,
    },

    /// A pooled agent was started without a scheduler attached.
    #[error("agent '{name}' is pool-scheduled but has no scheduler attached")]
    NoScheduler {
        /// Agent name.
        name: String,
    },

    /// A handler already exists for this exact message type.
    #[error("a handler is already registered for message type {message_type}")]
    DuplicateHandler {
        /// Rust type name of the message.
        message_type: &'static str,
    },

    /// `register_init_handler` was called twice.
    #[error("an init handler has already been registered")]
    InitHandlerExists,

    /// `register_exit_handler` was called twice.
    #[error("an exit handler has already been registered")]
    ExitHandlerExists,

    /// `route` found no peer under this name and index.
    #[error("no registered agent with name '{name}' and number {index}")]
    NoSuchPeer {
        /// Destination group name.
        name: String,
        /// Index inside the group.
        index: usize,
    },

    /// A message was consumed after the agent had already failed.
    #[error("agent has encountered an error and cannot continue its execution")]
    AlreadyFailed,

    /// No handler registered for the message's exact type.
    #[error("unknown message type {message_type}")]
    UnknownMessage {
        /// Rust type name of the message.
        message_type: &'static str,
    },

    /// An error object was submitted as a message.
    #[error("fault message: {0}")]
    Fault(Fault),

    /// A handler returned an error.
    #[error("handler for {message_type} failed: {error}")]
    Handler {
        /// Rust type name of the message being handled.
        message_type: &'static str,
        /// Error returned by the handler.
        #[source]
        error: Fault,
    },

    /// A consume cycle panicked.
    #[error("consume cycle panicked: {message}")]
    Panicked {
        /// Panic payload rendered as text.
        message: String,
    },

    /// The dedicated thread could not be spawned.
    #[error("failed to spawn agent thread: {message}")]
    Spawn {
        /// OS error message.
        message: String,
    },
}

impl AgentError {
    /// Returns a short stable label (snake_case) for use in logs/events.
    ///
    /// # Example
    /// ```
    /// use agentvisor::AgentError;
    ///
    /// assert_eq!(AgentError::AlreadyFailed.as_label(), "agent_already_failed");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            AgentError::NotSetup => "agent_not_setup",
            AgentError::AlreadySetup => "agent_already_setup",
            AgentError::NotStarted => "agent_not_started",
            AgentError::NotRegistered { .. } => "agent_not_registered",
            AgentError::RouterDown { .. } => "agent_router_down",
            AgentError::NoScheduler { .. } => "agent_no_scheduler",
            AgentError::DuplicateHandler { .. } => "agent_duplicate_handler",
            AgentError::InitHandlerExists => "agent_init_handler_exists",
            AgentError::ExitHandlerExists => "agent_exit_handler_exists",
            AgentError::NoSuchPeer { .. } => "agent_no_such_peer",
            AgentError::AlreadyFailed => "agent_already_failed",
            AgentError::UnknownMessage { .. } => "agent_unknown_message",
            AgentError::Fault(_) => "agent_fault",
            AgentError::Handler { .. } => "agent_handler_failed",
            AgentError::Panicked { .. } => "agent_panicked",
            AgentError::Spawn { .. } => "agent_spawn_failed",
        }
    }

    /// True for errors raised inside a consume cycle (terminal for the agent).
    pub fn is_fault(&self) -> bool {
        matches!(
            self,
            AgentError::AlreadyFailed
                | AgentError::UnknownMessage { .. }
                | AgentError::Fault(_)
                | AgentError::Handler { .. }
                | AgentError::Panicked { .. }
        )
    }
}

/// # Errors produced by the router on registration.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RouterError {
    /// The router went down (all agents stopped) and accepts no registrations.
    #[error("router is already down")]
    Down,

    /// Agents must carry a non-empty name.
    #[error("cannot register an agent without name")]
    EmptyName,

    /// Uniqueness was requested by the call or by the existing group.
    #[error("cannot register agent '{name}': group requires a unique agent")]
    NotUnique {
        /// Group name.
        name: String,
    },

    /// No group is registered under this name.
    #[error("no registered agent with name '{name}'")]
    NotRegistered {
        /// Group name.
        name: String,
    },
}

impl RouterError {
    /// Returns a short stable label (snake_case) for use in logs/events.
    pub fn as_label(&self) -> &'static str {
        match self {
            RouterError::Down => "router_down",
            RouterError::EmptyName => "router_empty_name",
            RouterError::NotUnique { .. } => "router_not_unique",
            RouterError::NotRegistered { .. } => "router_not_registered",
        }
    }
}

/// # Invalid runtime configuration.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// The worker pool needs at least one thread.
    #[error("number of worker threads must be greater than zero (got {0})")]
    InvalidWorkerThreads(i64),

    /// A configuration value could not be parsed.
    #[error("invalid value {value:?} for key '{key}'")]
    InvalidValue {
        /// Configuration key.
        key: String,
        /// Raw value.
        value: String,
    },
}

impl ConfigError {
    /// Returns a short stable label (snake_case) for use in logs/events.
    pub fn as_label(&self) -> &'static str {
        match self {
            ConfigError::InvalidWorkerThreads(_) => "config_invalid_worker_threads",
            ConfigError::InvalidValue { .. } => "config_invalid_value",
        }
    }
}

/// # Errors surfaced by the [`Runtime`](crate::Runtime) facade.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Construction failed on bad configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Registration failed.
    #[error(transparent)]
    Router(#[from] RouterError),

    /// An agent operation failed.
    #[error(transparent)]
    Agent(#[from] AgentError),

    /// A worker thread could not be spawned or joined.
    #[error("worker pool error: {0}")]
    Io(#[from] std::io::Error),

    /// A panic escaped a pool worker; the pool was torn down.
    #[error("worker {worker} failed: {message}")]
    WorkerFailed {
        /// Worker id.
        worker: usize,
        /// Panic message.
        message: String,
    },

    /// `run()` may only be called once.
    #[error("run cannot be called when state is {state}")]
    AlreadyRunning {
        /// Current runtime state.
        state: &'static str,
    },

    /// `run()` hit an error; all agents were asked to stop.
    #[error("encountered an error: {0}")]
    Failed(#[source] Box<RuntimeError>),
}

impl RuntimeError {
    /// Returns a short stable label (snake_case) for use in logs/events.
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::Config(e) => e.as_label(),
            RuntimeError::Router(e) => e.as_label(),
            RuntimeError::Agent(e) => e.as_label(),
            RuntimeError::Io(_) => "runtime_io",
            RuntimeError::WorkerFailed { .. } => "runtime_worker_failed",
            RuntimeError::AlreadyRunning { .. } => "runtime_already_running",
            RuntimeError::Failed(_) => "runtime_failed",
        }
    }
}

/// Renders a panic payload caught by `catch_unwind`.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
