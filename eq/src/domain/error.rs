//! Protocol error representation
//!
//! Errors travel through queues and across instances as `{code, message}`
//! pairs. Known codes map back to an [`ErrorKind`]; unknown codes degrade to
//! [`ErrorKind::Other`] without losing the code or message.

use serde::{Deserialize, Serialize};
use serde_json::Value;

// JSON-RPC standard codes
pub const PARSE_ERROR: i32 = -32700;
pub const INVALID_REQUEST: i32 = -32600;
pub const METHOD_NOT_FOUND: i32 = -32601;
pub const INVALID_PARAMS: i32 = -32602;
pub const INTERNAL_ERROR: i32 = -32603;

// Protocol-specific codes
pub const TASK_NOT_FOUND: i32 = -32001;
pub const TASK_NOT_CANCELABLE: i32 = -32002;
pub const PUSH_NOTIFICATION_NOT_SUPPORTED: i32 = -32003;
pub const UNSUPPORTED_OPERATION: i32 = -32004;
pub const CONTENT_TYPE_NOT_SUPPORTED: i32 = -32005;
pub const INVALID_AGENT_RESPONSE: i32 = -32006;

/// The known fault kinds, with a fallback for codes this build does not know
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    ParseError,
    InvalidRequest,
    MethodNotFound,
    InvalidParams,
    Internal,
    TaskNotFound,
    TaskNotCancelable,
    PushNotificationNotSupported,
    UnsupportedOperation,
    ContentTypeNotSupported,
    InvalidAgentResponse,
    /// Unknown or future error code
    Other,
}

/// A coded, human-readable failure
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    pub fn parse_error(message: impl Into<String>) -> Self {
        Self::new(PARSE_ERROR, message)
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(INVALID_REQUEST, message)
    }

    pub fn method_not_found() -> Self {
        Self::new(METHOD_NOT_FOUND, "Method not found")
    }

    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::new(INVALID_PARAMS, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(INTERNAL_ERROR, message)
    }

    pub fn task_not_found() -> Self {
        Self::new(TASK_NOT_FOUND, "Task not found")
    }

    pub fn task_not_cancelable() -> Self {
        Self::new(TASK_NOT_CANCELABLE, "Task cannot be canceled")
    }

    pub fn push_notification_not_supported() -> Self {
        Self::new(PUSH_NOTIFICATION_NOT_SUPPORTED, "Push Notification is not supported")
    }

    pub fn unsupported_operation() -> Self {
        Self::new(UNSUPPORTED_OPERATION, "This operation is not supported")
    }

    pub fn content_type_not_supported() -> Self {
        Self::new(CONTENT_TYPE_NOT_SUPPORTED, "Incompatible content types")
    }

    pub fn invalid_agent_response() -> Self {
        Self::new(INVALID_AGENT_RESPONSE, "Invalid agent response")
    }

    /// Map the code back to a known fault kind
    pub fn kind(&self) -> ErrorKind {
        match self.code {
            PARSE_ERROR => ErrorKind::ParseError,
            INVALID_REQUEST => ErrorKind::InvalidRequest,
            METHOD_NOT_FOUND => ErrorKind::MethodNotFound,
            INVALID_PARAMS => ErrorKind::InvalidParams,
            INTERNAL_ERROR => ErrorKind::Internal,
            TASK_NOT_FOUND => ErrorKind::TaskNotFound,
            TASK_NOT_CANCELABLE => ErrorKind::TaskNotCancelable,
            PUSH_NOTIFICATION_NOT_SUPPORTED => ErrorKind::PushNotificationNotSupported,
            UNSUPPORTED_OPERATION => ErrorKind::UnsupportedOperation,
            CONTENT_TYPE_NOT_SUPPORTED => ErrorKind::ContentTypeNotSupported,
            INVALID_AGENT_RESPONSE => ErrorKind::InvalidAgentResponse,
            _ => ErrorKind::Other,
        }
    }
}

impl std::fmt::Display for JsonRpcError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (code {})", self.message, self.code)
    }
}
