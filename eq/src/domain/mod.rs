//! Domain model: events, task states, and protocol errors

mod error;
mod event;

pub use error::{ErrorKind, JsonRpcError};
pub use event::{
    Artifact, Event, Message, Part, QueueEvent, Role, Task, TaskArtifactUpdateEvent, TaskState, TaskStatus,
    TaskStatusUpdateEvent,
};
