//! Per-task event queues: root buffers, taps, and their lifecycle

mod error;
mod event_queue;
mod item;

pub use error::QueueError;
pub use event_queue::{
    CloseCallback, EventQueue, EventQueueBuilder, EventTap, DEFAULT_QUEUE_SIZE, ENQUEUE_TIMEOUT,
    POLLER_START_TIMEOUT,
};
pub use item::{EnqueueHook, QueueItem};
