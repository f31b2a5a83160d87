//! LLM driver trait and message types.
//!
//! The [`LlmDriver`] trait defines the streaming interface to the upstream
//! completion service. One implementation exists:
//! [`ChatCompletionsDriver`], for the OpenAI Chat Completions API
//! (`/v1/chat/completions`).

pub mod chat_completions;
pub mod provider;

pub use chat_completions::ChatCompletionsDriver;
pub use provider::Provider;

use chrono::{DateTime, Utc};
use futures::Stream;
use uuid::Uuid;

use crate::normalized::NormalizedEvent;

/// LLM connection and model settings.
#[derive(Debug, Clone)]
pub struct LlmSettings {
    /// Base URL for the LLM API (e.g., `https://api.openai.com`).
    pub base_url: String,
    /// Optional API key for authentication.
    pub api_key: Option<String>,
    /// Model identifier (e.g., `gpt-4o`, `llama-3.1-70b`).
    pub model: String,
    /// Provider type (auto-detected from `base_url`).
    pub provider: Provider,
    /// Optional system prompt prepended to every request.
    pub system_prompt: Option<String>,
}

/// Role of a message author.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// System prompt.
    System,
    /// User message.
    User,
    /// Assistant response.
    Assistant,
}

/// One part of a message's content. Text-only for now; the part list keeps
/// the persisted record open to richer content later.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    /// Text content.
    Text {
        /// The text content.
        text: String,
    },
}

impl ContentPart {
    /// Create a text content part.
    #[must_use]
    pub fn text(s: impl Into<String>) -> Self {
        Self::Text { text: s.into() }
    }
}

/// A message in the conversation.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Message {
    /// Unique message identifier.
    pub id: String,
    /// Role of the message author.
    pub role: MessageRole,
    /// Content parts (at least one).
    pub parts: Vec<ContentPart>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

impl Message {
    fn new(role: MessageRole, text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            parts: vec![ContentPart::text(text)],
            created_at: Utc::now(),
        }
    }

    /// Create a user message with a fresh id.
    #[must_use]
    pub fn user(text: impl Into<String>) -> Self {
        Self::new(MessageRole::User, text)
    }

    /// Create an assistant message with a fresh id.
    #[must_use]
    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(MessageRole::Assistant, text)
    }

    /// Concatenated text of all parts.
    #[must_use]
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .map(|p| match p {
                ContentPart::Text { text } => text.as_str(),
            })
            .collect()
    }
}

/// Request to an LLM driver: messages already in wire format.
#[derive(Debug)]
pub struct LlmRequest {
    /// Conversation messages in the provider's JSON shape.
    pub messages: Vec<serde_json::Value>,
}

/// Build wire-format messages for a request, prepending the system prompt
/// when one is configured.
#[must_use]
pub fn wire_messages(system_prompt: Option<&str>, messages: &[Message]) -> Vec<serde_json::Value> {
    let mut wire = Vec::with_capacity(messages.len() + 1);
    if let Some(prompt) = system_prompt {
        wire.push(serde_json::json!({ "role": "system", "content": prompt }));
    }
    for msg in messages {
        let role = match msg.role {
            MessageRole::System => "system",
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
        };
        wire.push(serde_json::json!({ "role": role, "content": msg.text() }));
    }
    wire
}

/// Trait for LLM streaming drivers.
///
/// Implementations provide streaming access to completion responses,
/// emitting [`NormalizedEvent`]s as the model generates output.
#[async_trait::async_trait]
pub trait LlmDriver: Send + Sync {
    /// Stream a response from the LLM.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the connection is interrupted.
    async fn stream(
        &self,
        req: LlmRequest,
    ) -> anyhow::Result<std::pin::Pin<Box<dyn Stream<Item = anyhow::Result<NormalizedEvent>> + Send>>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_text_concatenates_parts() {
        let mut msg = Message::user("Hello");
        msg.parts.push(ContentPart::text(" world"));
        assert_eq!(msg.text(), "Hello world");
    }

    #[test]
    fn test_wire_messages_with_system_prompt() {
        let messages = vec![Message::user("hi"), Message::assistant("hello")];
        let wire = wire_messages(Some("Be brief."), &messages);

        assert_eq!(wire.len(), 3);
        assert_eq!(wire[0]["role"], "system");
        assert_eq!(wire[0]["content"], "Be brief.");
        assert_eq!(wire[1]["role"], "user");
        assert_eq!(wire[2]["role"], "assistant");
        assert_eq!(wire[2]["content"], "hello");
    }

    #[test]
    fn test_wire_messages_without_system_prompt() {
        let wire = wire_messages(None, &[Message::user("hi")]);
        assert_eq!(wire.len(), 1);
        assert_eq!(wire[0]["role"], "user");
    }

    #[test]
    fn test_message_serde_shape() {
        let msg = Message::user("hi");
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["role"], "user");
        assert_eq!(json["parts"][0]["type"], "text");
        assert_eq!(json["parts"][0]["text"], "hi");
    }
}
