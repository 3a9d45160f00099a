//! Task finalization oracle
//!
//! Queue lifecycle is tied to task lifecycle: a closed queue may only leave
//! the registry once the task itself has reached a terminal state. The task
//! store answers that question through this trait. It is consulted on every
//! close callback and on every `create_or_tap` against a closed root, so
//! implementations must be cheap and safe to call concurrently.

use std::collections::HashSet;
use std::sync::Mutex;

/// Answers whether a task has reached a terminal state
pub trait TaskStateProvider: Send + Sync {
    fn is_task_finalized(&self, task_id: &str) -> bool;
}

/// Set-backed provider for tests and single-process embedding
#[derive(Default)]
pub struct InMemoryTaskStateProvider {
    finalized: Mutex<HashSet<String>>,
}

impl InMemoryTaskStateProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that a task has reached a terminal state
    pub fn mark_finalized(&self, task_id: &str) {
        self.finalized.lock().unwrap().insert(task_id.to_string());
    }
}

impl TaskStateProvider for InMemoryTaskStateProvider {
    fn is_task_finalized(&self, task_id: &str) -> bool {
        self.finalized.lock().unwrap().contains(task_id)
    }
}
