//! Replication wire entity
//!
//! One envelope carries one task's event or error between server instances,
//! or the reserved termination marker ("poison pill") that propagates a root
//! close. Exactly one of `event`/`error` is present on a payload envelope;
//! the marker carries neither and sets `close` instead. Anything else is
//! malformed and gets dropped by the receiver, never crashing the shared
//! broker subscription.

use eventqueue::{Event, JsonRpcError, QueueEvent, QueueItem};
use serde::{Deserialize, Serialize};

use crate::error::ReplicationError;

fn is_false(value: &bool) -> bool {
    !*value
}

/// `{ taskId, event? | error?, close? }` as replicated through the broker
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    task_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    event: Option<Event>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<JsonRpcError>,
    #[serde(default, skip_serializing_if = "is_false")]
    close: bool,
}

/// What an envelope carries
#[derive(Clone, Debug, PartialEq)]
pub enum Payload {
    Event(Event),
    Error(JsonRpcError),
    Close,
}

impl Envelope {
    pub fn event(task_id: impl Into<String>, event: Event) -> Self {
        Self {
            task_id: task_id.into(),
            event: Some(event),
            error: None,
            close: false,
        }
    }

    pub fn error(task_id: impl Into<String>, error: JsonRpcError) -> Self {
        Self {
            task_id: task_id.into(),
            event: None,
            error: Some(error),
            close: false,
        }
    }

    /// The reserved termination marker for a task's stream
    pub fn close_marker(task_id: impl Into<String>) -> Self {
        Self {
            task_id: task_id.into(),
            event: None,
            error: None,
            close: true,
        }
    }

    /// Wrap a locally-enqueued item for publication
    pub fn from_item(task_id: &str, item: &QueueItem) -> Self {
        match item.event() {
            QueueEvent::Event(event) => Self::event(task_id, event.clone()),
            QueueEvent::Error(error) => Self::error(task_id, error.clone()),
        }
    }

    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    pub fn is_close(&self) -> bool {
        self.close
    }

    pub fn has_event(&self) -> bool {
        self.event.is_some()
    }

    pub fn has_error(&self) -> bool {
        self.error.is_some()
    }

    pub fn into_payload(self) -> Payload {
        if self.close {
            Payload::Close
        } else if let Some(event) = self.event {
            Payload::Event(event)
        } else if let Some(error) = self.error {
            Payload::Error(error)
        } else {
            // Unreachable for validated envelopes; treat as a close so a bug
            // here ends a stream instead of wedging it
            Payload::Close
        }
    }

    pub fn to_json(&self) -> Result<String, ReplicationError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse and structurally validate one wire frame
    pub fn from_json(json: &str) -> Result<Self, ReplicationError> {
        let envelope: Envelope = serde_json::from_str(json)?;
        envelope.validate()?;
        Ok(envelope)
    }

    fn validate(&self) -> Result<(), ReplicationError> {
        if self.close {
            if self.event.is_some() || self.error.is_some() {
                return Err(ReplicationError::MalformedEnvelope(
                    "close marker must not carry an event or error".to_string(),
                ));
            }
            return Ok(());
        }
        match (&self.event, &self.error) {
            (Some(_), Some(_)) => Err(ReplicationError::MalformedEnvelope(
                "both event and error present".to_string(),
            )),
            (None, None) => Err(ReplicationError::MalformedEnvelope(
                "neither event nor error present".to_string(),
            )),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use eventqueue::{
        Artifact, Message, Part, Task, TaskArtifactUpdateEvent, TaskState, TaskStatus,
        TaskStatusUpdateEvent,
    };

    use super::*;

    fn round_trip(envelope: &Envelope) -> Envelope {
        let json = envelope.to_json().unwrap();
        let back = Envelope::from_json(&json).unwrap();
        // Idempotent under repetition
        let again = Envelope::from_json(&back.to_json().unwrap()).unwrap();
        assert_eq!(back, again);
        back
    }

    #[test]
    fn test_round_trip_message() {
        let envelope = Envelope::event("t1", Event::Message(Message::agent_text("t1", "hello")));
        let back = round_trip(&envelope);
        assert_eq!(back, envelope);
        assert!(back.has_event() && !back.has_error());
    }

    #[test]
    fn test_round_trip_task() {
        let envelope = Envelope::event(
            "t1",
            Event::Task(Task {
                id: "t1".to_string(),
                context_id: "c1".to_string(),
                status: TaskStatus {
                    state: TaskState::Submitted,
                    message: None,
                    timestamp: None,
                },
                artifacts: None,
            }),
        );
        assert_eq!(round_trip(&envelope), envelope);
        assert!(envelope.to_json().unwrap().contains(r#""kind":"task""#));
    }

    #[test]
    fn test_round_trip_status_update() {
        let envelope = Envelope::event(
            "t1",
            Event::StatusUpdate(TaskStatusUpdateEvent {
                task_id: "t1".to_string(),
                context_id: "c1".to_string(),
                status: TaskStatus {
                    state: TaskState::Working,
                    message: None,
                    timestamp: None,
                },
                is_final: false,
            }),
        );
        let json = envelope.to_json().unwrap();
        assert!(json.contains(r#""kind":"status-update""#));
        assert!(json.contains(r#""final":false"#));
        assert_eq!(round_trip(&envelope), envelope);
    }

    #[test]
    fn test_round_trip_artifact_update() {
        let envelope = Envelope::event(
            "t1",
            Event::ArtifactUpdate(TaskArtifactUpdateEvent {
                task_id: "t1".to_string(),
                context_id: "c1".to_string(),
                artifact: Artifact {
                    artifact_id: "a1".to_string(),
                    name: Some("report".to_string()),
                    description: None,
                    parts: vec![Part::text("chunk")],
                },
                append: Some(true),
                last_chunk: Some(false),
            }),
        );
        let json = envelope.to_json().unwrap();
        assert!(json.contains(r#""kind":"artifact-update""#));
        assert_eq!(round_trip(&envelope), envelope);
    }

    #[test]
    fn test_round_trip_error() {
        let envelope = Envelope::error("t1", JsonRpcError::task_not_found());
        let json = envelope.to_json().unwrap();
        assert!(json.contains(r#""error""#));
        assert!(!json.contains(r#""event""#));
        let back = round_trip(&envelope);
        assert_eq!(back, envelope);
        match back.into_payload() {
            Payload::Error(error) => assert_eq!(error, JsonRpcError::task_not_found()),
            other => panic!("Expected an error payload, got {other:?}"),
        }
    }

    #[test]
    fn test_close_marker() {
        let envelope = Envelope::close_marker("t1");
        let json = envelope.to_json().unwrap();
        assert!(json.contains(r#""close":true"#));
        let back = Envelope::from_json(&json).unwrap();
        assert!(back.is_close());
        assert_eq!(back.into_payload(), Payload::Close);
    }

    #[test]
    fn test_empty_envelope_rejected() {
        let result = Envelope::from_json(r#"{"taskId":"t1"}"#);
        assert!(matches!(result, Err(ReplicationError::MalformedEnvelope(_))));
    }

    #[test]
    fn test_event_and_error_together_rejected() {
        let json = r#"{"taskId":"t1","event":{"kind":"message","role":"agent","parts":[],"messageId":"m1"},"error":{"code":-32603,"message":"boom"}}"#;
        assert!(matches!(
            Envelope::from_json(json),
            Err(ReplicationError::MalformedEnvelope(_))
        ));
    }

    #[test]
    fn test_close_marker_with_payload_rejected() {
        let json = r#"{"taskId":"t1","close":true,"error":{"code":-32603,"message":"boom"}}"#;
        assert!(matches!(
            Envelope::from_json(json),
            Err(ReplicationError::MalformedEnvelope(_))
        ));
    }

    #[test]
    fn test_unknown_event_kind_rejected() {
        let json = r#"{"taskId":"t1","event":{"kind":"telemetry","taskId":"t1"}}"#;
        assert!(matches!(Envelope::from_json(json), Err(ReplicationError::Serde(_))));
    }
}
