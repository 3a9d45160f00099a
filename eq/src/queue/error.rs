//! Queue and registry error types

use thiserror::Error;

/// Errors surfaced by event queues and the queue registry
///
/// `AlreadyExists` and `NoSuchQueue` signal caller bugs (two producers racing
/// to own a task, closing a task that was never registered) and are never
/// retried. `Closed` tells a consumer the stream has ended; transports should
/// translate it into a protocol-level "task already completed" response.
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("event queue for task {0} already exists")]
    AlreadyExists(String),

    #[error("no event queue registered for task {0}")]
    NoSuchQueue(String),

    #[error("event queue for task {0} is closed")]
    Closed(String),

    #[error("timed out waiting for a consumer to start polling task {0}")]
    PollerStartTimeout(String),
}
