//! Per-conversation state

use crate::protocol::Message;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Accumulated state of one conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationState {
    /// Caller-supplied identifier
    pub id: String,

    /// Append-only history in conversation order
    #[serde(default)]
    pub messages: Vec<Message>,

    /// Named facts remembered across calls
    #[serde(default)]
    pub context: BTreeMap<String, Value>,

    pub created_at: DateTime<Utc>,

    /// Last time the conversation was touched
    pub updated_at: DateTime<Utc>,
}

impl ConversationState {
    /// Create an empty conversation
    pub fn new(id: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            messages: Vec::new(),
            context: BTreeMap::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub(crate) fn push(&mut self, message: Message, now: DateTime<Utc>) {
        self.messages.push(message);
        self.updated_at = now;
    }

    pub(crate) fn set_context(&mut self, key: String, value: Value, now: DateTime<Utc>) {
        self.context.insert(key, value);
        self.updated_at = now;
    }

    /// Read-only summary of this conversation
    pub fn summary(&self) -> ConversationSummary {
        ConversationSummary {
            id: self.id.clone(),
            message_count: self.messages.len(),
            context_keys: self.context.keys().cloned().collect(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Derived view handed to callers instead of the state itself
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationSummary {
    pub id: String,
    pub message_count: usize,
    pub context_keys: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
