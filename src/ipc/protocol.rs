//! IPC message protocol
//!
//! Every channel carries the same envelope. A message without `succeeded` is a
//! request; a message with it is the reply to the request sharing its `id`.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Correlation ID for matching requests with replies
pub type CorrelationId = String;

/// Wire message envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: CorrelationId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default)]
    pub body: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub succeeded: Option<bool>,
}

impl Message {
    /// Create a request with a fresh correlation ID
    pub fn request(path: impl Into<String>, body: serde_json::Value) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            path: Some(path.into()),
            body,
            succeeded: None,
        }
    }

    /// Create the reply to `request`
    pub fn reply(request: &Message, succeeded: bool, body: serde_json::Value) -> Self {
        Self {
            id: request.id.clone(),
            path: request.path.clone(),
            body,
            succeeded: Some(succeeded),
        }
    }

    pub fn is_request(&self) -> bool {
        self.succeeded.is_none()
    }

    /// Textual encoding used by every adapter
    pub fn to_text(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_text(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

/// Body of a failed reply
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub message: String,
}

impl ErrorBody {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Recover the error text from a failure body of any shape
    pub fn message_of(body: &serde_json::Value) -> String {
        match serde_json::from_value::<ErrorBody>(body.clone()) {
            Ok(error) => error.message,
            Err(_) => match body {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            },
        }
    }
}
