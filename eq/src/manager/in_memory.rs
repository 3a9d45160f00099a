//! In-memory queue manager

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::provider::TaskStateProvider;
use crate::queue::{EventQueue, EventTap, QueueError};

use super::factory::{DefaultEventQueueFactory, EventQueueFactory};
use super::registry::Registry;
use super::QueueManager;

/// Process-local [`QueueManager`] backed by a [`Registry`]
///
/// Owns the create/tap/close lifecycle for every task's root queue. Closed
/// queues are removed lazily: only once the task state provider confirms the
/// task is finalized, so late events for still-active tasks keep a registered
/// (closed) sink instead of failing.
pub struct InMemoryQueueManager {
    registry: Arc<Registry>,
    factory: Arc<dyn EventQueueFactory>,
}

impl InMemoryQueueManager {
    pub fn new(provider: Arc<dyn TaskStateProvider>) -> Self {
        let registry = Registry::new(provider);
        let factory = Arc::new(DefaultEventQueueFactory::new(Arc::clone(&registry)));
        Self { registry, factory }
    }

    /// Assemble from pre-built parts; used by decorators that need their own
    /// factory wired to the same registry
    pub fn from_parts(registry: Arc<Registry>, factory: Arc<dyn EventQueueFactory>) -> Self {
        Self { registry, factory }
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn factory(&self) -> &Arc<dyn EventQueueFactory> {
        &self.factory
    }
}

#[async_trait]
impl QueueManager for InMemoryQueueManager {
    fn add(&self, task_id: &str, queue: EventQueue) -> Result<(), QueueError> {
        match self.registry.insert_if_absent(task_id, queue) {
            None => Ok(()),
            Some(_) => Err(QueueError::AlreadyExists(task_id.to_string())),
        }
    }

    fn get(&self, task_id: &str) -> Option<EventQueue> {
        self.registry.get(task_id)
    }

    fn tap(&self, task_id: &str) -> Result<Option<EventTap>, QueueError> {
        match self.registry.get(task_id) {
            None => Ok(None),
            Some(queue) => queue.tap().map(Some),
        }
    }

    async fn create_or_tap(&self, task_id: &str) -> EventTap {
        let mut existing = self.registry.get(task_id);

        // Lazy cleanup: a closed root is replaced only once the task is
        // finalized. Before that it stays put, denying duplicate creation
        // and absorbing events that were in flight when it closed.
        if let Some(queue) = &existing {
            if queue.is_closed() {
                if self.registry.provider().is_task_finalized(task_id) {
                    debug!(%task_id, "removing closed queue for finalized task");
                    self.registry.remove(task_id);
                    existing = None;
                } else {
                    debug!(%task_id, "queue closed but task not finalized, keeping it");
                }
            }
        }

        let root = match existing {
            Some(queue) => queue,
            None => {
                let fresh = self.factory.builder(task_id).build();
                match self.registry.insert_if_absent(task_id, fresh.clone()) {
                    // A concurrent creator won the race; discard ours
                    Some(winner) => winner,
                    None => {
                        debug!(%task_id, registered = self.registry.len(), "created root queue");
                        fresh
                    }
                }
            }
        };

        // Callers always get an independent cursor, never the root itself
        root.tap_unchecked()
    }

    async fn close(&self, task_id: &str) -> Result<(), QueueError> {
        match self.registry.remove(task_id) {
            None => Err(QueueError::NoSuchQueue(task_id.to_string())),
            Some(queue) => {
                debug!(%task_id, "closing and removing root queue");
                queue.close().await;
                Ok(())
            }
        }
    }

    async fn await_poller_start(&self, queue: &EventQueue) -> Result<(), QueueError> {
        queue.await_poller_start().await
    }

    fn active_child_count(&self, task_id: &str) -> i64 {
        match self.registry.get(task_id) {
            Some(queue) if !queue.is_closed() => queue.active_child_count() as i64,
            _ => -1,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use crate::domain::{Event, Message};
    use crate::provider::InMemoryTaskStateProvider;

    use super::*;

    fn manager() -> (InMemoryQueueManager, Arc<InMemoryTaskStateProvider>) {
        let provider = Arc::new(InMemoryTaskStateProvider::new());
        (InMemoryQueueManager::new(provider.clone()), provider)
    }

    #[tokio::test]
    async fn test_create_or_tap_registers_open_root() {
        let (manager, _) = manager();
        let _tap = manager.create_or_tap("t1").await;

        let root = manager.get("t1").expect("root must be registered");
        assert!(!root.is_closed());
        assert_eq!(root.task_id(), "t1");
    }

    #[tokio::test]
    async fn test_add_duplicate_refused() {
        let (manager, _) = manager();
        manager.add("t1", EventQueue::builder("t1").build()).unwrap();
        let err = manager.add("t1", EventQueue::builder("t1").build()).unwrap_err();
        assert!(matches!(err, QueueError::AlreadyExists(_)));
    }

    #[tokio::test]
    async fn test_close_unknown_task_refused() {
        let (manager, _) = manager();
        let err = manager.close("missing").await.unwrap_err();
        assert!(matches!(err, QueueError::NoSuchQueue(_)));
    }

    #[tokio::test]
    async fn test_tap_absent_and_closed() {
        let (manager, _) = manager();
        assert!(manager.tap("t1").unwrap().is_none());

        let _tap = manager.create_or_tap("t1").await;
        assert!(manager.tap("t1").unwrap().is_some());

        manager.get("t1").unwrap().close().await;
        assert!(matches!(manager.tap("t1"), Err(QueueError::Closed(_))));
    }

    #[tokio::test]
    async fn test_closed_unfinalized_root_is_reused() {
        let (manager, _) = manager();
        let _tap = manager.create_or_tap("t1").await;
        let root = manager.get("t1").unwrap();
        root.close().await;

        let mut tap = manager.create_or_tap("t1").await;
        let same = manager.get("t1").unwrap();
        assert!(same.is_closed(), "the same closed root must be retained");
        // A fresh tap on a closed root has nothing to drain
        assert!(matches!(tap.dequeue(None).await, Err(QueueError::Closed(_))));
    }

    #[tokio::test]
    async fn test_closed_finalized_root_is_replaced() {
        let (manager, provider) = manager();
        let _tap = manager.create_or_tap("t1").await;
        manager.get("t1").unwrap().close().await;

        provider.mark_finalized("t1");
        let _tap2 = manager.create_or_tap("t1").await;
        let replacement = manager.get("t1").unwrap();
        assert!(!replacement.is_closed(), "finalized task gets a brand-new open root");
    }

    #[tokio::test]
    async fn test_concurrent_create_or_tap_single_root() {
        let (manager, _) = manager();
        let manager = Arc::new(manager);

        let a = Arc::clone(&manager);
        let b = Arc::clone(&manager);
        let (tap_a, tap_b) = tokio::join!(a.create_or_tap("t1"), b.create_or_tap("t1"));
        let mut tap_a = tap_a;
        let mut tap_b = tap_b;

        assert_eq!(manager.registry().len(), 1);
        assert_eq!(manager.active_child_count("t1"), 2);

        let root = manager.get("t1").unwrap();
        root.enqueue(Event::Message(Message::agent_text("t1", "fan out"))).await;

        let got_a = tap_a.dequeue(Some(Duration::from_millis(100))).await.unwrap();
        let got_b = tap_b.dequeue(Some(Duration::from_millis(100))).await.unwrap();
        assert!(got_a.is_some() && got_b.is_some(), "both taps receive the event");
    }

    #[tokio::test]
    async fn test_active_child_count_contract() {
        let (manager, _) = manager();
        assert_eq!(manager.active_child_count("t1"), -1);

        let _tap = manager.create_or_tap("t1").await;
        assert_eq!(manager.active_child_count("t1"), 1);

        manager.get("t1").unwrap().close().await;
        assert_eq!(manager.active_child_count("t1"), -1);
    }
}
