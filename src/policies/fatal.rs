//! # Fatal-error classification.
//!
//! [`ErrorPolicy`] tells the router whether an agent failure is fatal to the
//! whole system. Closures `Fn(&str, &AgentError) -> bool` implement it too.
//!
//! ```
//! use agentvisor::{AgentError, ErrorPolicy};
//!
//! let only_panics = |_agent: &str, err: &AgentError| matches!(err, AgentError::Panicked { .. });
//! assert!(!only_panics.is_fatal("a", &AgentError::AlreadyFailed));
//! ```

use crate::error::AgentError;

/// Decides whether a failure reported by `agent` stops every agent.
pub trait ErrorPolicy: Send + Sync + 'static {
    /// Returns `true` if `error` raised by `agent` is fatal.
    fn is_fatal(&self, agent: &str, error: &AgentError) -> bool;
}

/// Every failure is fatal (default).
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysFatal;

impl ErrorPolicy for AlwaysFatal {
    fn is_fatal(&self, _agent: &str, _error: &AgentError) -> bool {
        true
    }
}

/// No failure is fatal.
#[derive(Debug, Clone, Copy, Default)]
pub struct NeverFatal;

impl ErrorPolicy for NeverFatal {
    fn is_fatal(&self, _agent: &str, _error: &AgentError) -> bool {
        false
    }
}

impl<F> ErrorPolicy for F
where
    F: Fn(&str, &AgentError) -> bool + Send + Sync + 'static,
{
    fn is_fatal(&self, agent: &str, error: &AgentError) -> bool {
        self(agent, error)
    }
}
