//! Conversation-scoped context access for collaborators

use super::store::ConversationStore;
use serde_json::Value;
use std::sync::Arc;

/// Read/write access to the context of exactly one conversation
#[derive(Debug, Clone)]
pub struct ContextHandle {
    store: Arc<ConversationStore>,
    conversation_id: String,
}

impl ContextHandle {
    pub fn new(store: Arc<ConversationStore>, conversation_id: impl Into<String>) -> Self {
        Self {
            store,
            conversation_id: conversation_id.into(),
        }
    }

    /// Conversation this handle is scoped to
    pub fn conversation_id(&self) -> &str {
        &self.conversation_id
    }

    /// Read a context value
    pub fn get(&self, key: &str) -> Option<Value> {
        self.store.get_context(&self.conversation_id, key)
    }

    /// Write a context value
    pub fn set(&self, key: impl Into<String>, value: Value) {
        self.store.set_context(&self.conversation_id, key, value);
    }

    /// Keys currently set, in sorted order
    pub fn keys(&self) -> Vec<String> {
        self.store
            .summary(&self.conversation_id)
            .map(|summary| summary.context_keys)
            .unwrap_or_default()
    }
}
