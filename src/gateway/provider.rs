//! Provider seam: kinds, chat messages, errors and the completion trait
//!
//! Providers are a closed set. Some do not accept a `system` role; for those
//! the instruction is folded into the leading user turn by
//! [`prepare_messages`] instead of branching on provider names at call sites.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Known chat-completion providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    OpenAi,
    Groq,
    OpenRouter,
    Ollama,
    Gemini,
    HuggingFace,
}

impl ProviderKind {
    /// Whether the provider accepts a separate `system` role message.
    pub fn supports_system_role(&self) -> bool {
        match self {
            ProviderKind::OpenAi
            | ProviderKind::Groq
            | ProviderKind::OpenRouter
            | ProviderKind::Ollama => true,
            ProviderKind::Gemini | ProviderKind::HuggingFace => false,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "openai",
            ProviderKind::Groq => "groq",
            ProviderKind::OpenRouter => "openrouter",
            ProviderKind::Ollama => "ollama",
            ProviderKind::Gemini => "gemini",
            ProviderKind::HuggingFace => "huggingface",
        }
    }
}

/// Chat message role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A single chat turn
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// Shape messages for a provider's capabilities.
///
/// Providers with system-role support get the messages unchanged. For the
/// rest, all system content is joined and prepended to the first user
/// message; with no user message, it becomes one.
pub fn prepare_messages(kind: ProviderKind, messages: &[ChatMessage]) -> Vec<ChatMessage> {
    if kind.supports_system_role() {
        return messages.to_vec();
    }

    let system: Vec<&str> = messages
        .iter()
        .filter(|m| m.role == Role::System)
        .map(|m| m.content.as_str())
        .collect();
    let mut rest: Vec<ChatMessage> = messages
        .iter()
        .filter(|m| m.role != Role::System)
        .cloned()
        .collect();

    if system.is_empty() {
        return rest;
    }
    let preamble = system.join("\n\n");

    match rest.iter_mut().find(|m| m.role == Role::User) {
        Some(first_user) => {
            first_user.content = format!("{}\n\n{}", preamble, first_user.content);
        }
        None => rest.insert(0, ChatMessage::user(preamble)),
    }
    rest
}

/// Failure of one provider attempt. Every variant triggers fallback.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProviderError {
    #[error("timed out after {0:?}")]
    Timeout(Duration),
    #[error("HTTP status {0}")]
    Status(u16),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("provider reported error: {0}")]
    Provider(String),
    #[error("empty output")]
    EmptyOutput,
    #[error("malformed response: {0}")]
    Malformed(String),
    #[error("not configured: {0}")]
    NotConfigured(String),
}

/// A chat-completion provider that returns free-form text.
///
/// Implementations receive messages already shaped by [`prepare_messages`].
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Stable name used in logs and provenance fields
    fn name(&self) -> &str;

    fn kind(&self) -> ProviderKind;

    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, ProviderError>;
}
