//! Shared task-id → root-queue registry
//!
//! The registry is the only globally shared mutable structure in the crate.
//! All per-key mutation is atomic under one lock, and the deferred-removal
//! policy lives here in exactly one place (the cleanup callback), shared by
//! the in-memory manager and the replicated decorator.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tracing::debug;

use crate::provider::TaskStateProvider;
use crate::queue::{CloseCallback, EventQueue};

/// Concurrency-safe map of root queues keyed by task id
pub struct Registry {
    queues: Mutex<HashMap<String, EventQueue>>,
    provider: Arc<dyn TaskStateProvider>,
}

impl Registry {
    pub fn new(provider: Arc<dyn TaskStateProvider>) -> Arc<Self> {
        Arc::new(Self {
            queues: Mutex::new(HashMap::new()),
            provider,
        })
    }

    pub fn provider(&self) -> &Arc<dyn TaskStateProvider> {
        &self.provider
    }

    pub fn get(&self, task_id: &str) -> Option<EventQueue> {
        self.queues.lock().unwrap().get(task_id).cloned()
    }

    /// Atomic insert-if-absent; returns the already-registered queue on loss
    pub fn insert_if_absent(&self, task_id: &str, queue: EventQueue) -> Option<EventQueue> {
        let mut queues = self.queues.lock().unwrap();
        if let Some(existing) = queues.get(task_id) {
            return Some(existing.clone());
        }
        queues.insert(task_id.to_string(), queue);
        None
    }

    pub fn remove(&self, task_id: &str) -> Option<EventQueue> {
        self.queues.lock().unwrap().remove(task_id)
    }

    pub fn len(&self) -> usize {
        self.queues.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.queues.lock().unwrap().is_empty()
    }

    /// The close callback wired into every root built for this registry
    ///
    /// On the root's close transition it re-checks finalization and removes
    /// the entry only if the task is finalized. A non-finalized task keeps
    /// its closed root registered, where it absorbs late-arriving events and
    /// denies duplicate creation until finalization is confirmed.
    pub fn cleanup_callback(self: &Arc<Self>, task_id: &str) -> CloseCallback {
        let registry = Arc::clone(self);
        let task_id = task_id.to_string();
        Box::new(move || {
            let registry = Arc::clone(&registry);
            let task_id = task_id.clone();
            Box::pin(async move {
                debug!(%task_id, "queue close callback invoked");
                if !registry.provider.is_task_finalized(&task_id) {
                    debug!(%task_id, "task not finalized, retaining closed queue for late-arriving events");
                    return;
                }
                if registry.remove(&task_id).is_some() {
                    debug!(%task_id, remaining = registry.len(), "task finalized, removed queue from registry");
                } else {
                    debug!(%task_id, "queue was already removed from registry");
                }
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::provider::InMemoryTaskStateProvider;

    use super::*;

    #[test]
    fn test_insert_if_absent_is_atomic_per_key() {
        let registry = Registry::new(Arc::new(InMemoryTaskStateProvider::new()));
        let first = EventQueue::builder("t1").build();
        let second = EventQueue::builder("t1").build();

        assert!(registry.insert_if_absent("t1", first).is_none());
        assert!(registry.insert_if_absent("t1", second).is_some());
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn test_cleanup_retains_unfinalized_task() {
        let provider = Arc::new(InMemoryTaskStateProvider::new());
        let registry = Registry::new(provider.clone());
        let queue = EventQueue::builder("t1")
            .add_on_close_callback(registry.cleanup_callback("t1"))
            .build();
        registry.insert_if_absent("t1", queue.clone());

        queue.close().await;
        assert!(registry.get("t1").is_some(), "closed but unfinalized queue stays registered");

        provider.mark_finalized("t2");
        let finalized = EventQueue::builder("t2")
            .add_on_close_callback(registry.cleanup_callback("t2"))
            .build();
        registry.insert_if_absent("t2", finalized.clone());
        finalized.close().await;
        assert!(registry.get("t2").is_none(), "finalized queue is reclaimed on close");
    }
}
