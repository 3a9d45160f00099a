//! Queue items and the enqueue hook SPI

use async_trait::async_trait;

use crate::domain::QueueEvent;

/// A queue entry: the event plus where it came from
///
/// Items injected by a replication layer are marked `replicated` so the
/// enqueue hook can tell local production apart from remote replay and avoid
/// publishing an event back to the broker it just arrived from.
#[derive(Clone, Debug)]
pub struct QueueItem {
    event: QueueEvent,
    replicated: bool,
}

impl QueueItem {
    /// An item produced by the local task executor
    pub fn local(event: impl Into<QueueEvent>) -> Self {
        Self {
            event: event.into(),
            replicated: false,
        }
    }

    /// An item replayed from a remote instance
    pub fn replicated(event: impl Into<QueueEvent>) -> Self {
        Self {
            event: event.into(),
            replicated: true,
        }
    }

    pub fn event(&self) -> &QueueEvent {
        &self.event
    }

    pub fn into_event(self) -> QueueEvent {
        self.event
    }

    pub fn is_replicated(&self) -> bool {
        self.replicated
    }
}

/// Invoked on the root's enqueue path before fan-out, in enqueue order
///
/// The replication layer implements this to mirror local events to a broker.
/// The hook is awaited, so per-task publish order matches enqueue order.
#[async_trait]
pub trait EnqueueHook: Send + Sync {
    async fn on_enqueue(&self, task_id: &str, item: &QueueItem);
}
