//! Queue lifecycle management
//!
//! The [`QueueManager`] owns the task-id → root-queue mapping and its
//! deferred-deletion policy: a closed queue leaves the registry only once the
//! task is finalized, so events still in flight find a registered sink
//! instead of an error.

mod factory;
mod in_memory;
mod registry;

use async_trait::async_trait;

use crate::queue::{EventQueue, EventTap, QueueError};

pub use factory::{DefaultEventQueueFactory, EventQueueFactory};
pub use in_memory::InMemoryQueueManager;
pub use registry::Registry;

/// Owns creation, tapping, and deferred removal of per-task root queues
#[async_trait]
pub trait QueueManager: Send + Sync {
    /// Register an externally constructed root; at most one per task
    fn add(&self, task_id: &str, queue: EventQueue) -> Result<(), QueueError>;

    /// The registered root, if any
    fn get(&self, task_id: &str) -> Option<EventQueue>;

    /// Tap the registered root: `Ok(None)` if absent, `Err(Closed)` if the
    /// root has already closed
    fn tap(&self, task_id: &str) -> Result<Option<EventTap>, QueueError>;

    /// Resolve (create if needed) the root for a task and return a fresh tap
    ///
    /// A closed root whose task is finalized is replaced by a new one; a
    /// closed root whose task is still active is retained and tapped as-is.
    async fn create_or_tap(&self, task_id: &str) -> EventTap;

    /// Remove and close the registered root
    async fn close(&self, task_id: &str) -> Result<(), QueueError>;

    /// Block until a consumer has started polling the given root
    async fn await_poller_start(&self, queue: &EventQueue) -> Result<(), QueueError>;

    /// Live tap count, or `-1` if the queue is absent or closed
    fn active_child_count(&self, task_id: &str) -> i64;
}
