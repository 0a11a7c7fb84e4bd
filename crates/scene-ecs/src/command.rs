//! Deferred structural changes.
//!
//! Systems that decide to remove entities or detach components while
//! walking query results queue the change here instead of applying it
//! mid-walk. The scheduler applies the queue after each system returns.

use crate::{component::ComponentId, entity::EntityId};

/// A structural change waiting to be applied.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    /// Remove an entity and detach all of its payloads.
    Despawn(EntityId),
    /// Detach one component from an entity.
    Detach(EntityId, ComponentId),
}

/// FIFO queue of [`Command`]s.
#[derive(Debug, Default)]
pub struct CommandBuffer {
    queue: Vec<Command>,
}

impl CommandBuffer {
    /// Create an empty buffer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an entity removal.
    pub fn despawn(&mut self, entity: EntityId) -> &mut Self {
        self.queue.push(Command::Despawn(entity));
        self
    }

    /// Queue a component detach.
    pub fn detach(&mut self, entity: EntityId, component: impl Into<ComponentId>) -> &mut Self {
        self.queue.push(Command::Detach(entity, component.into()));
        self
    }

    /// Queue an arbitrary command.
    pub fn push(&mut self, command: Command) -> &mut Self {
        self.queue.push(command);
        self
    }

    /// Get the number of queued commands.
    #[must_use]
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Check if nothing is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Take every queued command, oldest first, leaving the buffer empty.
    pub fn take(&mut self) -> Vec<Command> {
        std::mem::take(&mut self.queue)
    }
}
