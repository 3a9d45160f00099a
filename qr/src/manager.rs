//! Replicated queue manager
//!
//! Decorates the in-memory [`QueueManager`] so that queue state converges
//! across independently-running server instances:
//!
//! - every locally-produced item on a root is mirrored to the broker
//! - every inbound envelope for a task with a live local root is injected
//!   into that root, marked replicated so it is not published again
//! - a local root close publishes the termination marker; receiving the
//!   marker closes the local mirror *without* echoing another marker
//! - a mirror closed by a remote marker before local finalization is kept for
//!   a grace window, then reclaimed

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use eventqueue::{
    EnqueueHook, EventQueue, EventQueueBuilder, EventQueueFactory, EventTap, InMemoryQueueManager,
    QueueError, QueueItem, QueueManager, Registry, TaskStateProvider,
};
use tracing::{debug, trace, warn};

use crate::envelope::{Envelope, Payload};
use crate::strategy::ReplicationStrategy;

/// Tunables for the replication layer
#[derive(Clone, Debug)]
pub struct ReplicationConfig {
    /// How long a remotely-closed, not-yet-finalized mirror stays registered
    /// before it is reclaimed
    pub grace_period: Duration,
}

impl Default for ReplicationConfig {
    fn default() -> Self {
        Self {
            grace_period: Duration::from_secs(30),
        }
    }
}

struct ReplicationShared {
    strategy: Arc<dyn ReplicationStrategy>,
    registry: Arc<Registry>,
    /// Tasks currently being closed because a remote marker arrived; their
    /// close callbacks must not publish an echo marker
    remote_closing: Mutex<HashSet<String>>,
    config: ReplicationConfig,
}

/// [`QueueManager`] decorator that mirrors queue traffic through a
/// [`ReplicationStrategy`]
pub struct ReplicatedQueueManager {
    inner: InMemoryQueueManager,
    shared: Arc<ReplicationShared>,
}

impl ReplicatedQueueManager {
    pub fn new(strategy: Arc<dyn ReplicationStrategy>, provider: Arc<dyn TaskStateProvider>) -> Self {
        Self::with_config(strategy, provider, ReplicationConfig::default())
    }

    pub fn with_config(
        strategy: Arc<dyn ReplicationStrategy>,
        provider: Arc<dyn TaskStateProvider>,
        config: ReplicationConfig,
    ) -> Self {
        let registry = Registry::new(provider);
        let shared = Arc::new(ReplicationShared {
            strategy,
            registry: Arc::clone(&registry),
            remote_closing: Mutex::new(HashSet::new()),
            config,
        });

        let factory = Arc::new(ReplicatedQueueFactory {
            shared: Arc::clone(&shared),
        });
        let inner = InMemoryQueueManager::from_parts(registry, factory);

        let handler_shared = Arc::clone(&shared);
        shared.strategy.subscribe(Arc::new(move |task_id, envelope| {
            let shared = Arc::clone(&handler_shared);
            Box::pin(async move {
                handle_remote(shared, task_id, envelope).await;
            })
        }));

        Self { inner, shared }
    }

    /// Builder for an externally-constructed root that carries the full
    /// replication wiring; roots registered through [`QueueManager::add`]
    /// should come from here
    pub fn queue_builder(&self, task_id: &str) -> EventQueueBuilder {
        self.inner.factory().builder(task_id)
    }

    pub fn registry(&self) -> &Arc<Registry> {
        self.inner.registry()
    }

    pub fn config(&self) -> &ReplicationConfig {
        &self.shared.config
    }
}

#[async_trait]
impl QueueManager for ReplicatedQueueManager {
    fn add(&self, task_id: &str, queue: EventQueue) -> Result<(), QueueError> {
        self.inner.add(task_id, queue)
    }

    fn get(&self, task_id: &str) -> Option<EventQueue> {
        self.inner.get(task_id)
    }

    fn tap(&self, task_id: &str) -> Result<Option<EventTap>, QueueError> {
        self.inner.tap(task_id)
    }

    async fn create_or_tap(&self, task_id: &str) -> EventTap {
        self.inner.create_or_tap(task_id).await
    }

    async fn close(&self, task_id: &str) -> Result<(), QueueError> {
        self.inner.close(task_id).await
    }

    async fn await_poller_start(&self, queue: &EventQueue) -> Result<(), QueueError> {
        self.inner.await_poller_start(queue).await
    }

    fn active_child_count(&self, task_id: &str) -> i64 {
        self.inner.active_child_count(task_id)
    }
}

/// Factory stacking replication wiring on top of the registry lifecycle
struct ReplicatedQueueFactory {
    shared: Arc<ReplicationShared>,
}

impl EventQueueFactory for ReplicatedQueueFactory {
    fn builder(&self, task_id: &str) -> EventQueueBuilder {
        EventQueue::builder(task_id)
            .task_state_provider(Arc::clone(self.shared.registry.provider()))
            .hook(Arc::new(PublishHook {
                strategy: Arc::clone(&self.shared.strategy),
            }))
            // Marker first: the stream end must be announced before the
            // registry entry can go away
            .add_on_close_callback(close_marker_callback(Arc::clone(&self.shared), task_id))
            .add_on_close_callback(self.shared.registry.cleanup_callback(task_id))
    }
}

/// Mirrors locally-produced items to the broker
struct PublishHook {
    strategy: Arc<dyn ReplicationStrategy>,
}

#[async_trait]
impl EnqueueHook for PublishHook {
    async fn on_enqueue(&self, task_id: &str, item: &QueueItem) {
        if item.is_replicated() {
            trace!(%task_id, "item arrived via replication, not publishing");
            return;
        }
        let envelope = Envelope::from_item(task_id, item);
        if let Err(err) = self.strategy.publish(task_id, &envelope).await {
            // Best effort: the local stream must not fail because the broker did
            warn!(%task_id, %err, "failed to publish replicated event");
        }
    }
}

fn close_marker_callback(shared: Arc<ReplicationShared>, task_id: &str) -> eventqueue::CloseCallback {
    let task_id = task_id.to_string();
    Box::new(move || {
        let shared = Arc::clone(&shared);
        let task_id = task_id.clone();
        Box::pin(async move {
            if shared.remote_closing.lock().unwrap().contains(&task_id) {
                debug!(%task_id, "close initiated by remote marker, not echoing");
                return;
            }
            debug!(%task_id, "publishing termination marker");
            if let Err(err) = shared
                .strategy
                .publish(&task_id, &Envelope::close_marker(&task_id))
                .await
            {
                warn!(%task_id, %err, "failed to publish termination marker");
            }
        })
    })
}

async fn handle_remote(shared: Arc<ReplicationShared>, task_id: String, envelope: Envelope) {
    match envelope.into_payload() {
        Payload::Close => {
            let Some(root) = shared.registry.get(&task_id) else {
                debug!(%task_id, "remote close for a task without a local queue, ignoring");
                return;
            };
            debug!(%task_id, "remote termination marker received, closing local mirror");
            shared.remote_closing.lock().unwrap().insert(task_id.clone());
            root.close().await;
            shared.remote_closing.lock().unwrap().remove(&task_id);

            // Finalization may be reported on another instance first; keep
            // the closed mirror around for the grace window before reclaiming
            if !shared.registry.provider().is_task_finalized(&task_id) {
                schedule_grace_reclaim(shared, task_id);
            }
        }
        Payload::Event(event) => inject(shared, task_id, QueueItem::replicated(event)).await,
        Payload::Error(error) => inject(shared, task_id, QueueItem::replicated(error)).await,
    }
}

async fn inject(shared: Arc<ReplicationShared>, task_id: String, item: QueueItem) {
    let Some(root) = shared.registry.get(&task_id) else {
        trace!(%task_id, "no local queue for replicated event, ignoring");
        return;
    };
    trace!(%task_id, "injecting replicated event into local root");
    // A closed-but-retained root accepts and drops this; never an error
    root.enqueue_item(item).await;
}

fn schedule_grace_reclaim(shared: Arc<ReplicationShared>, task_id: String) {
    let grace = shared.config.grace_period;
    debug!(%task_id, ?grace, "scheduling grace-period reclaim of closed mirror");
    tokio::spawn(async move {
        tokio::time::sleep(grace).await;
        match shared.registry.get(&task_id) {
            Some(queue) if queue.is_closed() => {
                shared.registry.remove(&task_id);
                debug!(%task_id, "grace period elapsed, reclaimed closed mirror");
            }
            _ => {}
        }
    });
}
