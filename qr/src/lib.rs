//! QueueRelay - cross-instance replication for per-task event queues
//!
//! In a horizontally-scaled deployment the executor driving a task and the
//! client streaming its events may land on different server instances. This
//! crate keeps every instance's local [`eventqueue`] state converged: a
//! [`ReplicatedQueueManager`] wraps the in-memory manager, mirrors each
//! locally-produced event through a pluggable [`ReplicationStrategy`], and
//! injects everything arriving from the broker into the matching local root.
//! Root closes propagate as a reserved termination marker so every mirror's
//! consumers observe the same end of stream.
//!
//! # Modules
//!
//! - [`envelope`] - the wire entity carried between instances
//! - [`strategy`] - the broker transport SPI and the in-process reference bus
//! - [`manager`] - the replicating manager decorator
//! - [`error`] - replication error types

pub mod envelope;
pub mod error;
pub mod manager;
pub mod strategy;

// Re-export commonly used types
pub use envelope::{Envelope, Payload};
pub use error::ReplicationError;
pub use manager::{ReplicatedQueueManager, ReplicationConfig};
pub use strategy::{InProcessBroker, InProcessStrategy, RemoteHandler, ReplicationStrategy};
