//! Core protocol message types
//!
//! Inside the crate a message is a role plus a closed [`MessageBody`], so every
//! role/type combination is matched exhaustively. On the wire it is the flat
//! envelope `{role, type, content, function_name?, arguments?, function_result?}`
//! described by [`WireMessage`].

use super::error::{ErrorDescriptor, ProtocolError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Metadata key linking a reply to the message it answers
pub const IN_REPLY_TO: &str = "in_reply_to";

/// Metadata key set to `false` when the caller stopped waiting for a reply
pub const DELIVERED: &str = "delivered";

/// Arguments of a function call, keyed by parameter name
pub type Arguments = Map<String, Value>;

/// Role of a message sender
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// Operator or scheduler instructions
    System,
    /// External caller input
    User,
    /// Engine-produced text reply
    Assistant,
    /// Engine-produced function result
    Function,
}

impl MessageRole {
    /// Wire name of the role
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::Function => "function",
        }
    }

    /// Whether external callers may send messages with this role
    pub fn is_inbound(&self) -> bool {
        matches!(self, Self::System | Self::User)
    }
}

impl fmt::Display for MessageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MessageRole {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "system" => Ok(Self::System),
            "user" => Ok(Self::User),
            "assistant" => Ok(Self::Assistant),
            "function" => Ok(Self::Function),
            other => Err(ProtocolError::InvalidRole {
                role: other.to_string(),
            }),
        }
    }
}

/// Type of a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    Text,
    FunctionCall,
    FunctionResult,
    Error,
}

impl MessageType {
    /// Wire name of the type
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::FunctionCall => "function_call",
            Self::FunctionResult => "function_result",
            Self::Error => "error",
        }
    }

    /// Whether external callers may send messages of this type
    pub fn is_inbound(&self) -> bool {
        matches!(self, Self::Text | Self::FunctionCall)
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MessageType {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(Self::Text),
            "function_call" => Ok(Self::FunctionCall),
            "function_result" => Ok(Self::FunctionResult),
            "error" => Ok(Self::Error),
            other => Err(ProtocolError::InvalidMessageType {
                message_type: other.to_string(),
                reason: "unrecognised message type".to_string(),
            }),
        }
    }
}

/// Content of a message - free text or a structured payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    /// Plain text content
    Text(String),
    /// Structured JSON payload
    Structured(Value),
}

impl Default for MessageContent {
    fn default() -> Self {
        Self::Text(String::new())
    }
}

impl MessageContent {
    /// Check if content is empty
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Text(s) => s.is_empty(),
            Self::Structured(v) => v.is_null(),
        }
    }

    /// Get text representation
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s.as_str()),
            Self::Structured(_) => None,
        }
    }

    /// Fold a structured JSON string into plain text
    ///
    /// Both encode to the same JSON, so only `Text` may hold a bare string.
    pub fn normalized(self) -> Self {
        match self {
            Self::Structured(Value::String(s)) => Self::Text(s),
            other => other,
        }
    }
}

impl From<Value> for MessageContent {
    fn from(value: Value) -> Self {
        Self::Structured(value).normalized()
    }
}

impl From<String> for MessageContent {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&str> for MessageContent {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

/// Type-specific part of a message
#[derive(Debug, Clone, PartialEq)]
pub enum MessageBody {
    /// Plain conversational message
    Text,
    /// Request to invoke a registered function
    FunctionCall { name: String, arguments: Arguments },
    /// Result produced by a function adapter
    FunctionResult { name: String, result: Value },
    /// Terminal error record
    Error(ErrorDescriptor),
}

impl MessageBody {
    /// Message type this body encodes
    pub fn message_type(&self) -> MessageType {
        match self {
            Self::Text => MessageType::Text,
            Self::FunctionCall { .. } => MessageType::FunctionCall,
            Self::FunctionResult { .. } => MessageType::FunctionResult,
            Self::Error(_) => MessageType::Error,
        }
    }
}

/// A message in a conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "WireMessage", into = "WireMessage")]
pub struct Message {
    /// Unique message identifier
    pub id: Uuid,

    /// Role of the message sender
    pub role: MessageRole,

    /// Free text or structured content
    pub content: MessageContent,

    /// Type-specific payload
    pub body: MessageBody,

    /// When the message was created
    pub timestamp: DateTime<Utc>,

    /// Open metadata map
    pub metadata: HashMap<String, Value>,
}

impl Message {
    /// Type of this message
    pub fn message_type(&self) -> MessageType {
        self.body.message_type()
    }

    /// Name of the called or answering function, if any
    pub fn function_name(&self) -> Option<&str> {
        match &self.body {
            MessageBody::FunctionCall { name, .. } | MessageBody::FunctionResult { name, .. } => {
                Some(name.as_str())
            }
            MessageBody::Text | MessageBody::Error(_) => None,
        }
    }

    /// Call arguments for function_call messages
    pub fn arguments(&self) -> Option<&Arguments> {
        match &self.body {
            MessageBody::FunctionCall { arguments, .. } => Some(arguments),
            _ => None,
        }
    }

    /// Function result payload for function_result messages
    pub fn result(&self) -> Option<&Value> {
        match &self.body {
            MessageBody::FunctionResult { result, .. } => Some(result),
            _ => None,
        }
    }

    /// Error descriptor for error messages
    pub fn error(&self) -> Option<&ErrorDescriptor> {
        match &self.body {
            MessageBody::Error(descriptor) => Some(descriptor),
            _ => None,
        }
    }

    /// Identifier of the message this one answers
    pub fn in_reply_to(&self) -> Option<Uuid> {
        self.metadata
            .get(IN_REPLY_TO)
            .and_then(Value::as_str)
            .and_then(|s| Uuid::parse_str(s).ok())
    }

    /// Replace the creation timestamp
    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Mark this message as the reply to `id`
    pub fn replying_to(mut self, id: Uuid) -> Self {
        self.metadata
            .insert(IN_REPLY_TO.to_string(), Value::String(id.to_string()));
        self
    }

    /// Create a user text message
    pub fn user(content: impl Into<MessageContent>) -> Self {
        MessageBuilder::new(MessageRole::User, content).build()
    }

    /// Create a system text message
    pub fn system(content: impl Into<MessageContent>) -> Self {
        MessageBuilder::new(MessageRole::System, content).build()
    }

    /// Create an assistant text message
    pub fn assistant(content: impl Into<MessageContent>) -> Self {
        MessageBuilder::new(MessageRole::Assistant, content).build()
    }

    /// Create a user function call
    pub fn function_call(name: impl Into<String>, arguments: Arguments) -> Self {
        MessageBuilder::new(MessageRole::User, "")
            .with_function_call(name, arguments)
            .build()
    }

    /// Create a function result message
    pub fn function_result(name: impl Into<String>, result: Value) -> Self {
        let name = name.into();
        let mut msg = MessageBuilder::new(MessageRole::Function, "").build();
        msg.content = MessageContent::Text(format!("{} completed", name));
        msg.body = MessageBody::FunctionResult { name, result };
        msg
    }

    /// Create an error record
    pub fn error_record(descriptor: ErrorDescriptor) -> Self {
        let mut msg = MessageBuilder::new(MessageRole::System, descriptor.message.clone()).build();
        msg.body = MessageBody::Error(descriptor);
        msg
    }
}

/// Builder for constructing messages
pub struct MessageBuilder {
    role: MessageRole,
    content: MessageContent,
    body: MessageBody,
    metadata: HashMap<String, Value>,
    timestamp: Option<DateTime<Utc>>,
}

impl MessageBuilder {
    /// Create a new text message builder
    pub fn new(role: MessageRole, content: impl Into<MessageContent>) -> Self {
        Self {
            role,
            content: content.into().normalized(),
            body: MessageBody::Text,
            metadata: HashMap::new(),
            timestamp: None,
        }
    }

    /// Turn the message into a function call
    pub fn with_function_call(mut self, name: impl Into<String>, arguments: Arguments) -> Self {
        self.body = MessageBody::FunctionCall {
            name: name.into(),
            arguments,
        };
        self
    }

    /// Add metadata
    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Stamp the message with `timestamp` instead of the system time
    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Build the message
    pub fn build(self) -> Message {
        Message {
            id: Uuid::new_v4(),
            role: self.role,
            content: self.content,
            body: self.body,
            timestamp: self.timestamp.unwrap_or_else(Utc::now),
            metadata: self.metadata,
        }
    }
}

/// Flat wire representation of a message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireMessage {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,

    pub role: String,

    #[serde(rename = "type")]
    pub message_type: String,

    #[serde(default)]
    pub content: MessageContent,

    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub function_name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub arguments: Option<Arguments>,

    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub function_result: Option<Value>,

    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error: Option<ErrorDescriptor>,

    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,

    #[serde(skip_serializing_if = "HashMap::is_empty", default)]
    pub metadata: HashMap<String, Value>,
}

impl TryFrom<WireMessage> for Message {
    type Error = ProtocolError;

    fn try_from(wire: WireMessage) -> Result<Self, Self::Error> {
        let role: MessageRole = wire.role.parse()?;
        let message_type: MessageType = wire.message_type.parse()?;

        let malformed = |reason: &str| ProtocolError::InvalidMessageType {
            message_type: message_type.to_string(),
            reason: reason.to_string(),
        };

        let body = match message_type {
            MessageType::Text => MessageBody::Text,
            MessageType::FunctionCall => MessageBody::FunctionCall {
                name: wire
                    .function_name
                    .filter(|name| !name.is_empty())
                    .ok_or_else(|| malformed("function_call requires function_name"))?,
                arguments: wire.arguments.unwrap_or_default(),
            },
            MessageType::FunctionResult => MessageBody::FunctionResult {
                name: wire
                    .function_name
                    .ok_or_else(|| malformed("function_result requires function_name"))?,
                result: wire.function_result.unwrap_or(Value::Null),
            },
            MessageType::Error => MessageBody::Error(
                wire.error
                    .ok_or_else(|| malformed("error message requires an error descriptor"))?,
            ),
        };

        Ok(Message {
            id: wire.id,
            role,
            content: wire.content,
            body,
            timestamp: wire.timestamp,
            metadata: wire.metadata,
        })
    }
}

impl From<Message> for WireMessage {
    fn from(msg: Message) -> Self {
        let mut wire = WireMessage {
            id: msg.id,
            role: msg.role.as_str().to_string(),
            message_type: msg.body.message_type().as_str().to_string(),
            content: msg.content,
            function_name: None,
            arguments: None,
            function_result: None,
            error: None,
            timestamp: msg.timestamp,
            metadata: msg.metadata,
        };
        match msg.body {
            MessageBody::Text => {}
            MessageBody::FunctionCall { name, arguments } => {
                wire.function_name = Some(name);
                wire.arguments = Some(arguments);
            }
            MessageBody::FunctionResult { name, result } => {
                wire.function_name = Some(name);
                wire.function_result = Some(result);
            }
            MessageBody::Error(descriptor) => {
                wire.error = Some(descriptor);
            }
        }
        wire
    }
}
