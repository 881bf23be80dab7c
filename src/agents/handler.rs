//! # Handler table: exact-type message dispatch.
//!
//! One entry per message [`TypeId`]. Registering a second handler for the same
//! type fails; a message whose type has no entry fails the consume cycle with
//! [`AgentError::UnknownMessage`].

use std::any::{Any, TypeId};
use std::collections::HashMap;

use crate::agents::AgentRef;
use crate::agents::message::Envelope;
use crate::error::{AgentError, BoxError, Fault};

type ErasedHandler =
    Box<dyn FnMut(&AgentRef, Box<dyn Any + Send>) -> Result<(), BoxError> + Send + 'static>;

struct Entry {
    type_name: &'static str,
    handler: ErasedHandler,
}

/// Message type → handler.
#[derive(Default)]
pub(crate) struct HandlerTable {
    entries: HashMap<TypeId, Entry>,
}

impl HandlerTable {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Adds a handler for messages of exactly type `M`.
    pub(crate) fn insert<M, F>(&mut self, mut handler: F) -> Result<(), AgentError>
    where
        M: Any + Send,
        F: FnMut(&AgentRef, M) -> Result<(), BoxError> + Send + 'static,
    {
        let type_name = std::any::type_name::<M>();
        if self.entries.contains_key(&TypeId::of::<M>()) {
            return Err(AgentError::DuplicateHandler {
                message_type: type_name,
            });
        }

        let erased: ErasedHandler = Box::new(
            move |agent: &AgentRef, body: Box<dyn Any + Send>| match body.downcast::<M>() {
                Ok(message) => handler(agent, *message),
                Err(_) => Err(format!("message is not a {type_name}").into()),
            },
        );
        self.entries.insert(
            TypeId::of::<M>(),
            Entry {
                type_name,
                handler: erased,
            },
        );
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn contains<M: Any>(&self) -> bool {
        self.entries.contains_key(&TypeId::of::<M>())
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    /// Runs the handler registered for the envelope's exact type.
    pub(crate) fn dispatch(&mut self, agent: &AgentRef, envelope: Envelope) -> Result<(), AgentError> {
        let Some(entry) = self.entries.get_mut(&envelope.type_id()) else {
            return Err(AgentError::UnknownMessage {
                message_type: envelope.type_name(),
            });
        };
        let message_type = entry.type_name;
        (entry.handler)(agent, envelope.into_body()).map_err(|error| AgentError::Handler {
            message_type,
            error: Fault::from(error),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_type_is_rejected() {
        let mut table = HandlerTable::new();
        table.insert::<u32, _>(|_, _| Ok(())).unwrap();
        let err = table.insert::<u32, _>(|_, _| Ok(())).unwrap_err();
        assert!(matches!(err, AgentError::DuplicateHandler { message_type: "u32" }));

        table.insert::<u64, _>(|_, _| Ok(())).unwrap();
        assert_eq!(table.len(), 2);
        assert!(table.contains::<u64>());
        assert!(!table.contains::<i8>());
    }
}
