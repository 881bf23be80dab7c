//! # Messages carried by agent mailboxes.
//!
//! Any `'static + Send` value can be a message. The mailbox stores it in an
//! [`Envelope`] that remembers the exact [`TypeId`] and type name, so handler
//! lookup matches the concrete type only (no subtyping, no coercion).
//!
//! Two message types are reserved by the runtime and get built-in handlers in
//! [`Agent::setup`](crate::Agent::setup):
//! - [`InitAgent`] moves the agent to `RUNNING` and calls the init handler;
//! - [`StopAgent`] moves it to `STOPPED`, calls the exit handler and the
//!   strategy's stop hook.
//!
//! A submitted [`Fault`](crate::Fault) is a third reserved type: it makes the
//! agent fail without dispatch.

use std::any::{Any, TypeId};
use std::fmt;

use crate::error::Fault;

/// Internal message asking the agent to initialize.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InitAgent;

/// Internal message asking the agent to stop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StopAgent {
    cause: String,
}

impl StopAgent {
    /// Creates a stop message with a human-readable cause.
    pub fn new(cause: impl Into<String>) -> Self {
        Self {
            cause: cause.into(),
        }
    }

    /// Why the agent is being stopped.
    pub fn cause(&self) -> &str {
        &self.cause
    }
}

/// Type-erased message with its exact runtime type.
pub(crate) struct Envelope {
    type_id: TypeId,
    type_name: &'static str,
    body: Box<dyn Any + Send>,
}

impl Envelope {
    pub(crate) fn new<M: Any + Send>(message: M) -> Self {
        Self {
            type_id: TypeId::of::<M>(),
            type_name: std::any::type_name::<M>(),
            body: Box::new(message),
        }
    }

    pub(crate) fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub(crate) fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub(crate) fn into_body(self) -> Box<dyn Any + Send> {
        self.body
    }

    /// Extracts the fault if this envelope carries one.
    pub(crate) fn into_fault(self) -> Result<Fault, Envelope> {
        if self.type_id != TypeId::of::<Fault>() {
            return Err(self);
        }
        let Envelope {
            type_id,
            type_name,
            body,
        } = self;
        body.downcast::<Fault>().map(|f| *f).map_err(|body| Envelope {
            type_id,
            type_name,
            body,
        })
    }
}

impl fmt::Debug for Envelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Envelope")
            .field("type", &self.type_name)
            .finish_non_exhaustive()
    }
}
