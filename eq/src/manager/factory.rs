//! Root queue construction

use std::sync::Arc;

use crate::queue::{EventQueue, EventQueueBuilder};

use super::registry::Registry;

/// Builds configured root queues for a task
///
/// The manager calls this on first demand for a task id. Implementations
/// decide what gets wired into every root: the default wires the task state
/// provider and the registry cleanup callback; the replication layer adds its
/// publish hook and termination marker on top.
pub trait EventQueueFactory: Send + Sync {
    fn builder(&self, task_id: &str) -> EventQueueBuilder;
}

/// Factory wiring roots to a registry's lifecycle policy
pub struct DefaultEventQueueFactory {
    registry: Arc<Registry>,
}

impl DefaultEventQueueFactory {
    pub fn new(registry: Arc<Registry>) -> Self {
        Self { registry }
    }
}

impl EventQueueFactory for DefaultEventQueueFactory {
    fn builder(&self, task_id: &str) -> EventQueueBuilder {
        EventQueue::builder(task_id)
            .task_state_provider(Arc::clone(self.registry.provider()))
            .add_on_close_callback(self.registry.cleanup_callback(task_id))
    }
}
