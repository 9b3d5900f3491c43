// Chat module
// Chat completion over a local Ollama server or an OpenAI-compatible API

mod ollama;
mod openai;


use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::Result;

pub use ollama::OllamaChat;
pub use openai::OpenAiChat;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    #[inline]
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    #[inline]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    #[inline]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Short provider name used in logs and error messages
    fn name(&self) -> &'static str;

    fn model(&self) -> &str;

    /// Send the full conversation and return the assistant's reply text
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String>;
}
