//! Replies to plain text messages

use super::adapter::AdapterError;
use crate::protocol::{Message, MessageContent};
use async_trait::async_trait;

/// Produces the assistant reply to an inbound text message
#[async_trait]
pub trait ReplyPolicy: Send + Sync {
    /// `history` is the conversation as it stood before `message`
    async fn reply(
        &self,
        conversation_id: &str,
        message: &Message,
        history: &[Message],
    ) -> Result<MessageContent, AdapterError>;
}

/// Default policy: a short acknowledgement echoing the request
#[derive(Debug, Default, Clone, Copy)]
pub struct AcknowledgePolicy;

/// Longest excerpt of the inbound text quoted back
const EXCERPT_CHARS: usize = 80;

#[async_trait]
impl ReplyPolicy for AcknowledgePolicy {
    async fn reply(
        &self,
        _conversation_id: &str,
        message: &Message,
        _history: &[Message],
    ) -> Result<MessageContent, AdapterError> {
        let text = match message.content.as_text() {
            Some(text) if !text.trim().is_empty() => {
                let excerpt: String = text.trim().chars().take(EXCERPT_CHARS).collect();
                format!("Acknowledged: {}", excerpt)
            }
            _ => "Acknowledged".to_string(),
        };
        Ok(MessageContent::Text(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_acknowledges_text() {
        let reply = AcknowledgePolicy
            .reply("c1", &Message::user("status please"), &[])
            .await
            .unwrap();
        assert_eq!(reply.as_text(), Some("Acknowledged: status please"));
    }

    #[tokio::test]
    async fn test_structured_content_gets_plain_ack() {
        let message = Message::user(MessageContent::Structured(json!({"q": 1})));
        let reply = AcknowledgePolicy.reply("c1", &message, &[]).await.unwrap();
        assert_eq!(reply.as_text(), Some("Acknowledged"));
    }
}
