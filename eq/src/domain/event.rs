//! Domain event types for task execution streaming
//!
//! These are the facts a task executor can emit while working on a task:
//! - `Message` - a conversational message from the user or the agent
//! - `Task` - a full snapshot of the task (status, artifacts)
//! - `StatusUpdate` - an incremental task status transition
//! - `ArtifactUpdate` - an incremental artifact chunk
//!
//! The `kind` discriminator round-trips through serialization, so a remote
//! instance always reconstructs the exact variant that was published.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::error::JsonRpcError;

/// Core event enum - everything a task executor can put on the wire
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Event {
    /// A conversational message produced during task execution
    Message(Message),
    /// A terminal snapshot of the whole task
    Task(Task),
    /// An incremental status transition
    StatusUpdate(TaskStatusUpdateEvent),
    /// An incremental artifact chunk
    ArtifactUpdate(TaskArtifactUpdateEvent),
}

impl Event {
    /// The wire discriminator for this event
    pub fn kind(&self) -> &'static str {
        match self {
            Event::Message(_) => "message",
            Event::Task(_) => "task",
            Event::StatusUpdate(_) => "status-update",
            Event::ArtifactUpdate(_) => "artifact-update",
        }
    }

    /// The task this event belongs to, when the event carries one
    pub fn task_id(&self) -> Option<&str> {
        match self {
            Event::Message(m) => m.task_id.as_deref(),
            Event::Task(t) => Some(&t.id),
            Event::StatusUpdate(s) => Some(&s.task_id),
            Event::ArtifactUpdate(a) => Some(&a.task_id),
        }
    }

    /// True if this event ends the task's event stream
    pub fn is_final(&self) -> bool {
        match self {
            Event::StatusUpdate(s) => s.is_final,
            Event::Task(t) => t.status.state.is_final(),
            _ => false,
        }
    }
}

/// What actually flows through an event queue: a domain event or a
/// protocol-level error destined for the consumer
#[derive(Clone, Debug, PartialEq)]
pub enum QueueEvent {
    /// A domain fact emitted by the task executor
    Event(Event),
    /// A coded failure the consumer must surface
    Error(JsonRpcError),
}

impl From<Event> for QueueEvent {
    fn from(event: Event) -> Self {
        QueueEvent::Event(event)
    }
}

impl From<JsonRpcError> for QueueEvent {
    fn from(error: JsonRpcError) -> Self {
        QueueEvent::Error(error)
    }
}

/// Lifecycle states of a task
///
/// The last five are terminal: a task in one of those states will never
/// transition again, and its queue can be reclaimed once closed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskState {
    /// Received and queued for processing
    Submitted,
    /// Actively being processed
    Working,
    /// Waiting on additional user input
    InputRequired,
    /// Waiting on authentication or authorization
    AuthRequired,
    /// Finished successfully (terminal)
    Completed,
    /// Canceled by the user or the system (terminal)
    Canceled,
    /// Failed during execution (terminal)
    Failed,
    /// Rejected by the agent (terminal)
    Rejected,
    /// State cannot be determined (terminal)
    Unknown,
}

impl TaskState {
    /// True if this state is terminal
    pub fn is_final(&self) -> bool {
        matches!(
            self,
            TaskState::Completed
                | TaskState::Canceled
                | TaskState::Failed
                | TaskState::Rejected
                | TaskState::Unknown
        )
    }
}

/// A task's status at a point in time
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TaskStatus {
    pub state: TaskState,
    /// Optional message accompanying the transition
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<Message>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl TaskStatus {
    /// Status with the given state, stamped with the current time
    pub fn new(state: TaskState) -> Self {
        Self {
            state,
            message: None,
            timestamp: Some(Utc::now()),
        }
    }
}

/// Who authored a message
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Agent,
}

/// One piece of message or artifact content
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Part {
    /// Plain text content
    Text { text: String },
    /// Structured JSON content
    Data { data: Value },
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Part::Text { text: text.into() }
    }
}

/// A conversational message exchanged during task execution
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub role: Role,
    pub parts: Vec<Part>,
    pub message_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_id: Option<String>,
}

impl Message {
    /// Agent-authored text message bound to a task
    pub fn agent_text(task_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            role: Role::Agent,
            parts: vec![Part::text(text)],
            message_id: uuid::Uuid::new_v4().to_string(),
            task_id: Some(task_id.into()),
            context_id: None,
        }
    }
}

/// An output artifact produced by a task
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Artifact {
    pub artifact_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub parts: Vec<Part>,
}

/// Full task snapshot
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub context_id: String,
    pub status: TaskStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifacts: Option<Vec<Artifact>>,
}

/// Incremental status transition for a task
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskStatusUpdateEvent {
    pub task_id: String,
    pub context_id: String,
    pub status: TaskStatus,
    /// True when this update ends the task's event stream
    #[serde(rename = "final")]
    pub is_final: bool,
}

impl TaskStatusUpdateEvent {
    pub fn new(task_id: impl Into<String>, context_id: impl Into<String>, state: TaskState) -> Self {
        Self {
            task_id: task_id.into(),
            context_id: context_id.into(),
            status: TaskStatus::new(state),
            is_final: state.is_final(),
        }
    }
}

/// Incremental artifact chunk for a task
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskArtifactUpdateEvent {
    pub task_id: String,
    pub context_id: String,
    pub artifact: Artifact,
    /// True when this chunk appends to an artifact announced earlier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub append: Option<bool>,
    /// True when this is the last chunk of the artifact
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_chunk: Option<bool>,
}
