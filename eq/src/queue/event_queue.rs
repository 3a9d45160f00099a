//! Per-task event queue: one root, many taps
//!
//! The root receives every event a task executor produces and fans it out to
//! all currently-attached taps. Each tap is an independent cursor with its own
//! bounded buffer; a slow tap never delays a fast one. Closing the root stops
//! fan-out and refuses new taps, but existing taps keep their drain rights:
//! they consume what is already buffered and then observe `Closed`.
//!
//! Backpressure: `enqueue` waits up to [`ENQUEUE_TIMEOUT`] per tap for buffer
//! space. A tap that stays full past the deadline is treated as a vanished
//! consumer and detached, so the producer never blocks indefinitely.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::{mpsc, watch};
use tokio::time::timeout;
use tracing::{debug, trace, warn};

use crate::domain::QueueEvent;
use crate::provider::TaskStateProvider;

use super::error::QueueError;
use super::item::{EnqueueHook, QueueItem};

/// Default per-tap buffer capacity
pub const DEFAULT_QUEUE_SIZE: usize = 1000;

/// Longest a producer will wait for space in one tap's buffer
pub const ENQUEUE_TIMEOUT: Duration = Duration::from_secs(5);

/// Longest `await_poller_start` will wait for a consumer to begin polling
pub const POLLER_START_TIMEOUT: Duration = Duration::from_secs(10);

/// Callback invoked exactly once when a root queue closes
pub type CloseCallback = Box<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;

#[derive(Clone)]
struct TapSlot {
    id: u64,
    tx: mpsc::Sender<QueueItem>,
}

struct RootShared {
    task_id: String,
    queue_size: usize,
    taps: Mutex<Vec<TapSlot>>,
    next_tap_id: AtomicU64,
    /// Flipped to true once the close sequence has run
    closed_tx: watch::Sender<bool>,
    /// Guards the close sequence so callbacks fire exactly once
    closing: AtomicBool,
    on_close: Vec<CloseCallback>,
    state_provider: Option<Arc<dyn TaskStateProvider>>,
    hook: Option<Arc<dyn EnqueueHook>>,
    poller_started_tx: watch::Sender<bool>,
}

/// The root event queue for one task
///
/// Cheap to clone; all clones share the same state. Producers call
/// [`enqueue`](EventQueue::enqueue), consumers attach through
/// [`tap`](EventQueue::tap) and read from the returned [`EventTap`].
#[derive(Clone)]
pub struct EventQueue {
    shared: Arc<RootShared>,
}

impl EventQueue {
    /// Start building a root queue for the given task
    pub fn builder(task_id: impl Into<String>) -> EventQueueBuilder {
        EventQueueBuilder::new(task_id)
    }

    pub fn task_id(&self) -> &str {
        &self.shared.task_id
    }

    /// Configured per-tap buffer capacity
    pub fn queue_size(&self) -> usize {
        self.shared.queue_size
    }

    pub fn is_closed(&self) -> bool {
        *self.shared.closed_tx.borrow()
    }

    /// Number of taps still attached
    pub fn active_child_count(&self) -> usize {
        self.shared.taps.lock().unwrap().len()
    }

    /// Enqueue an event or error for fan-out to all attached taps
    ///
    /// A closed root accepts the call and drops the event with a debug log:
    /// late events (typically replicated ones still in flight) are never an
    /// error.
    pub async fn enqueue(&self, event: impl Into<QueueEvent>) {
        self.enqueue_item(QueueItem::local(event)).await;
    }

    /// Enqueue a pre-wrapped item, preserving its replication marker
    pub async fn enqueue_item(&self, item: QueueItem) {
        if self.is_closed() {
            debug!(task_id = %self.shared.task_id, "queue closed, dropping late event");
            return;
        }

        if let Some(hook) = &self.shared.hook {
            hook.on_enqueue(&self.shared.task_id, &item).await;
        }

        // Snapshot senders so the lock is not held across await points
        let targets: Vec<TapSlot> = self.shared.taps.lock().unwrap().clone();
        trace!(
            task_id = %self.shared.task_id,
            taps = targets.len(),
            "distributing event to taps"
        );

        let mut stalled = Vec::new();
        for slot in targets {
            match timeout(ENQUEUE_TIMEOUT, slot.tx.send(item.clone())).await {
                Ok(Ok(())) => {}
                Ok(Err(_)) => {
                    // Receiver dropped without closing; detach quietly
                    trace!(task_id = %self.shared.task_id, tap = slot.id, "tap receiver gone, detaching");
                    stalled.push(slot.id);
                }
                Err(_) => {
                    warn!(
                        task_id = %self.shared.task_id,
                        tap = slot.id,
                        timeout = ?ENQUEUE_TIMEOUT,
                        "tap buffer full past deadline, detaching stalled consumer"
                    );
                    stalled.push(slot.id);
                }
            }
        }
        if !stalled.is_empty() {
            self.shared.taps.lock().unwrap().retain(|s| !stalled.contains(&s.id));
        }
    }

    /// Attach a new independent view starting at the current tail
    ///
    /// Taps never see events enqueued before their creation. A closed root
    /// cannot be tapped: the stream has ended and the caller should fetch the
    /// task's final state from the task store instead.
    pub fn tap(&self) -> Result<EventTap, QueueError> {
        if self.is_closed() {
            return Err(QueueError::Closed(self.shared.task_id.clone()));
        }
        Ok(self.tap_unchecked())
    }

    /// Tap regardless of closed state
    ///
    /// Used by the queue manager when it intentionally hands out a cursor on a
    /// closed-but-retained root; the tap observes `Closed` as soon as it has
    /// drained (immediately, for a fresh tap).
    pub(crate) fn tap_unchecked(&self) -> EventTap {
        let (tx, rx) = mpsc::channel(self.shared.queue_size);
        let id = self.shared.next_tap_id.fetch_add(1, Ordering::Relaxed);
        {
            // Checked under the taps lock: close() flips the flag before it
            // clears the slots, so a slot registered here never survives a
            // concurrent close
            let mut taps = self.shared.taps.lock().unwrap();
            if !self.is_closed() {
                taps.push(TapSlot { id, tx });
            }
        }
        // A closed root drops `tx` here, so the tap drains straight to Closed
        let (closed_tx, _) = watch::channel(false);
        debug!(task_id = %self.shared.task_id, tap = id, "created tap");
        EventTap {
            task_id: self.shared.task_id.clone(),
            id,
            rx,
            closed_tx,
            root: self.clone(),
        }
    }

    /// Close the root: run close callbacks once, stop fan-out, detach taps
    ///
    /// Idempotent. Attached taps are not force-closed; they drain their
    /// buffers and then observe `Closed`.
    pub async fn close(&self) {
        if self.shared.closing.swap(true, Ordering::SeqCst) {
            return;
        }
        debug!(task_id = %self.shared.task_id, "closing root queue");
        // Callbacks run before the closed flag flips so they still see an
        // open queue (the registry cleanup and replication markers rely on
        // observing the close transition, not the closed state).
        for callback in &self.shared.on_close {
            callback().await;
        }
        // send_replace updates the value even with no receivers subscribed
        self.shared.closed_tx.send_replace(true);
        // Dropping the senders lets each tap drain and then observe Closed
        self.shared.taps.lock().unwrap().clear();
    }

    /// Block until some tap has started polling, with a bounded wait
    ///
    /// Used to avoid the race where a producer emits before a streaming
    /// transport has begun reading.
    pub async fn await_poller_start(&self) -> Result<(), QueueError> {
        let mut rx = self.shared.poller_started_tx.subscribe();
        match timeout(POLLER_START_TIMEOUT, rx.wait_for(|started| *started)).await {
            Ok(Ok(_)) => Ok(()),
            _ => Err(QueueError::PollerStartTimeout(self.shared.task_id.clone())),
        }
    }

    fn signal_poller_started(&self) {
        if !*self.shared.poller_started_tx.borrow() {
            debug!(task_id = %self.shared.task_id, "queue poller started");
            self.shared.poller_started_tx.send_replace(true);
        }
    }

    /// A tap has closed; detach it and decide whether the root can go too
    async fn tap_closing(&self, id: u64) {
        let remaining = {
            let mut taps = self.shared.taps.lock().unwrap();
            taps.retain(|s| s.id != id);
            taps.len()
        };
        if remaining > 0 || self.is_closed() {
            return;
        }
        if let Some(provider) = &self.shared.state_provider {
            if !provider.is_task_finalized(&self.shared.task_id) {
                debug!(
                    task_id = %self.shared.task_id,
                    "last tap closed but task not finalized, keeping root open for resubscription"
                );
                return;
            }
            debug!(task_id = %self.shared.task_id, "last tap closed and task finalized, closing root");
        }
        self.close().await;
    }
}

/// An independent read cursor over one task's event stream
pub struct EventTap {
    task_id: String,
    id: u64,
    rx: mpsc::Receiver<QueueItem>,
    closed_tx: watch::Sender<bool>,
    root: EventQueue,
}

impl EventTap {
    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    pub fn is_closed(&self) -> bool {
        *self.closed_tx.borrow()
    }

    /// Number of items currently buffered in this tap
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    /// Pop the next item in FIFO order
    ///
    /// Blocks until an item arrives, the deadline elapses (`Ok(None)`), or the
    /// stream ends (`Err(Closed)`): either this tap was closed, or the root
    /// closed and this tap's buffer has drained. `wait: None` blocks without a
    /// deadline.
    pub async fn dequeue(&mut self, wait: Option<Duration>) -> Result<Option<QueueItem>, QueueError> {
        self.root.signal_poller_started();

        if self.is_closed() {
            return Err(QueueError::Closed(self.task_id.clone()));
        }

        // Buffered items drain even after the root has closed
        match self.rx.try_recv() {
            Ok(item) => {
                trace!(task_id = %self.task_id, tap = self.id, "dequeued buffered item");
                return Ok(Some(item));
            }
            Err(TryRecvError::Disconnected) => {
                debug!(task_id = %self.task_id, tap = self.id, "root closed and drained");
                return Err(QueueError::Closed(self.task_id.clone()));
            }
            Err(TryRecvError::Empty) => {}
        }

        let task_id = self.task_id.clone();
        let mut closed_rx = self.closed_tx.subscribe();
        match wait {
            None => {
                tokio::select! {
                    _ = closed_rx.wait_for(|closed| *closed) => Err(QueueError::Closed(task_id)),
                    item = self.rx.recv() => match item {
                        Some(item) => Ok(Some(item)),
                        None => Err(QueueError::Closed(task_id)),
                    },
                }
            }
            Some(wait) => {
                tokio::select! {
                    _ = closed_rx.wait_for(|closed| *closed) => Err(QueueError::Closed(task_id)),
                    item = self.rx.recv() => match item {
                        Some(item) => Ok(Some(item)),
                        None => Err(QueueError::Closed(task_id)),
                    },
                    _ = tokio::time::sleep(wait) => Ok(None),
                }
            }
        }
    }

    /// Close this tap only
    ///
    /// Unblocks a pending `dequeue` immediately with `Closed` and discards
    /// anything still buffered. Sibling taps and the root are unaffected,
    /// except that the root auto-closes when its last tap detaches from an
    /// already-finalized task.
    pub async fn close(&mut self) {
        if self.closed_tx.send_replace(true) {
            return;
        }
        debug!(task_id = %self.task_id, tap = self.id, "closing tap");
        self.rx.close();
        self.root.tap_closing(self.id).await;
    }
}

/// Configures and builds a root [`EventQueue`]
pub struct EventQueueBuilder {
    task_id: String,
    queue_size: usize,
    on_close: Vec<CloseCallback>,
    state_provider: Option<Arc<dyn TaskStateProvider>>,
    hook: Option<Arc<dyn EnqueueHook>>,
}

impl EventQueueBuilder {
    pub fn new(task_id: impl Into<String>) -> Self {
        Self {
            task_id: task_id.into(),
            queue_size: DEFAULT_QUEUE_SIZE,
            on_close: Vec::new(),
            state_provider: None,
            hook: None,
        }
    }

    /// Override the task id this queue is bound to
    pub fn task_id(mut self, task_id: impl Into<String>) -> Self {
        self.task_id = task_id.into();
        self
    }

    /// Per-tap buffer capacity (default [`DEFAULT_QUEUE_SIZE`])
    pub fn queue_size(mut self, queue_size: usize) -> Self {
        self.queue_size = queue_size;
        self
    }

    /// Register a callback to run exactly once when the root closes
    pub fn add_on_close_callback(mut self, callback: CloseCallback) -> Self {
        self.on_close.push(callback);
        self
    }

    /// Oracle consulted when deciding whether the root may auto-close
    pub fn task_state_provider(mut self, provider: Arc<dyn TaskStateProvider>) -> Self {
        self.state_provider = Some(provider);
        self
    }

    /// Hook invoked on every enqueue before fan-out
    pub fn hook(mut self, hook: Arc<dyn EnqueueHook>) -> Self {
        self.hook = Some(hook);
        self
    }

    pub fn build(self) -> EventQueue {
        let (closed_tx, _) = watch::channel(false);
        let (poller_started_tx, _) = watch::channel(false);
        trace!(task_id = %self.task_id, queue_size = self.queue_size, "creating root queue");
        EventQueue {
            shared: Arc::new(RootShared {
                task_id: self.task_id,
                queue_size: self.queue_size,
                taps: Mutex::new(Vec::new()),
                next_tap_id: AtomicU64::new(0),
                closed_tx,
                closing: AtomicBool::new(false),
                on_close: self.on_close,
                state_provider: self.state_provider,
                hook: self.hook,
                poller_started_tx,
            }),
        }
    }
}
