//! EventQueue - per-task event distribution for agent task execution
//!
//! This crate is the event-transport substrate of an agent-to-agent
//! task-execution server: every running task gets one root [`EventQueue`]
//! fed by its executor, and every streaming consumer gets an independent
//! [`EventTap`] over that root. The [`QueueManager`] owns the task-id →
//! root mapping and the deferred-removal policy that keeps closed queues
//! around until the task itself is confirmed finalized.
//!
//! # Core Concepts
//!
//! - **One root per task**: the single authoritative buffer, enforced by an
//!   atomic insert-if-absent registry
//! - **Independent taps**: each consumer drains at its own pace with its own
//!   bounded buffer; a stalled consumer is detached, never waited on forever
//! - **Deferred removal**: a closed queue stays registered until the task
//!   state provider reports finalization, absorbing late-arriving events
//! - **Pluggable hooks**: the enqueue hook and close callbacks are the seams
//!   a replication layer attaches to
//!
//! # Modules
//!
//! - [`domain`] - event and error types crossing the wire
//! - [`queue`] - the root queue, taps, and their close semantics
//! - [`manager`] - registry, factory, and lifecycle policy
//! - [`provider`] - the task finalization oracle

pub mod domain;
pub mod manager;
pub mod provider;
pub mod queue;

// Re-export commonly used types
pub use domain::{
    Artifact, ErrorKind, Event, JsonRpcError, Message, Part, QueueEvent, Role, Task,
    TaskArtifactUpdateEvent, TaskState, TaskStatus, TaskStatusUpdateEvent,
};
pub use manager::{
    DefaultEventQueueFactory, EventQueueFactory, InMemoryQueueManager, QueueManager, Registry,
};
pub use provider::{InMemoryTaskStateProvider, TaskStateProvider};
pub use queue::{
    CloseCallback, EnqueueHook, EventQueue, EventQueueBuilder, EventTap, QueueError, QueueItem,
    DEFAULT_QUEUE_SIZE,
};
