use std::sync::Arc;

use crate::types::ActionId;

/// Something that keeps its own references to actions (trigger assignments,
/// scheduled jobs) and must drop them when an action row goes away.
pub trait DeletionListener: Send + Sync {
    fn on_action_deleted(&self, id: &ActionId);
}

/// Fan-out of deletion events to every registered listener.
#[derive(Clone, Default)]
pub struct Notifier {
    listeners: Vec<Arc<dyn DeletionListener>>,
}

impl std::fmt::Debug for Notifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Notifier")
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl Notifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, listener: Arc<dyn DeletionListener>) -> &mut Self {
        self.listeners.push(listener);
        self
    }

    /// Call every listener once, in subscription order.
    pub fn broadcast(&self, id: &ActionId) {
        for listener in &self.listeners {
            listener.on_action_deleted(id);
        }
    }
}
