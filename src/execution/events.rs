//! Change notifications for executables.
//!
//! The executor publishes an [`ExecutorEvent`] after every structural change
//! to its collection or to an individual executable. Observers (editor
//! bindings, the CLI) subscribe through a broadcast channel; having no
//! subscribers is normal and not an error.

use tokio::sync::broadcast;

use super::executable::{ExecutableId, ExecutionStatus};

/// Default capacity of the event channel.
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Events published by the executor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutorEvent {
    /// An executable's state changed (status, statement, links, or lost flag).
    Changed {
        id: ExecutableId,
        status: ExecutionStatus,
        lost: bool,
    },
    /// An executable no longer matches any statement and left the collection.
    Lost { id: ExecutableId },
    /// The tracked collection was replaced; ids are in textual order.
    CollectionReplaced {
        ids: Vec<ExecutableId>,
        active: Option<ExecutableId>,
    },
}

/// Sending side of the event channel.
#[derive(Debug, Clone)]
pub struct Notifier {
    sender: broadcast::Sender<ExecutorEvent>,
}

impl Notifier {
    /// Creates a notifier with the given channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Subscribes to future events.
    pub fn subscribe(&self) -> broadcast::Receiver<ExecutorEvent> {
        self.sender.subscribe()
    }

    /// Publishes an event. Dropped silently when nobody listens.
    pub fn publish(&self, event: ExecutorEvent) {
        let _ = self.sender.send(event);
    }
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}
