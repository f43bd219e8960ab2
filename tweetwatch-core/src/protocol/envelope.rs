//! Request/response envelopes exchanged with callers

use super::error::{ErrorDescriptor, ProtocolError};
use super::types::{Message, WireMessage};
use serde::{Deserialize, Serialize};

/// Inbound request bound to a conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    /// Caller-supplied conversation identifier
    pub conversation_id: String,

    /// The inbound message
    pub message: Message,
}

impl Request {
    /// Create a new request
    pub fn new(conversation_id: impl Into<String>, message: Message) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            message,
        }
    }
}

/// Loosely typed request as it arrives on the wire
///
/// Role and type are kept as strings so that unrecognised values are
/// reported as protocol errors instead of decode failures.
#[derive(Debug, Clone, Deserialize)]
pub struct WireRequest {
    pub conversation_id: String,
    pub message: WireMessage,
}

impl WireRequest {
    /// Decode a wire request from JSON text
    pub fn from_json(text: &str) -> Result<Self, ProtocolError> {
        serde_json::from_str(text).map_err(|e| ProtocolError::MalformedRequest {
            reason: e.to_string(),
        })
    }

    /// Convert into a typed request
    pub fn into_request(self) -> Result<Request, (String, ProtocolError)> {
        match Message::try_from(self.message) {
            Ok(message) => Ok(Request {
                conversation_id: self.conversation_id,
                message,
            }),
            Err(err) => Err((self.conversation_id, err)),
        }
    }
}

/// Reply returned to the caller for every request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    /// Conversation the reply belongs to
    pub conversation_id: String,

    /// The reply message
    pub message: Message,

    /// Present when the request failed
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error: Option<ErrorDescriptor>,
}

impl Response {
    /// Build a response from a reply; error replies populate `error`
    pub fn from_reply(conversation_id: impl Into<String>, message: Message) -> Self {
        let error = message.error().cloned();
        Self {
            conversation_id: conversation_id.into(),
            message,
            error,
        }
    }

    /// Whether the request failed
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// Serialize to JSON text
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
