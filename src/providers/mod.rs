// Providers module
// Builds embedding and chat clients from configuration and per-request overrides


use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::chat::{ChatProvider, OllamaChat, OpenAiChat};
use crate::config::{ChatConfig, ChatProviderKind, Config, EmbeddingConfig};
use crate::embeddings::{EmbeddingProvider, OllamaClient};
use crate::{RagError, Result};

const MAX_ERROR_DETAIL_CHARS: usize = 500;

/// HTTP agent shared by every provider client.
///
/// Non-2xx statuses are returned as responses so the provider's own error
/// payload can be read and surfaced.
pub(crate) fn build_agent(timeout: Duration) -> ureq::Agent {
    ureq::Agent::config_builder()
        .timeout_global(Some(timeout))
        .http_status_as_error(false)
        .build()
        .into()
}

/// Pull a human-readable message out of a provider error body.
///
/// Understands `{"error": "..."}` (Ollama) and `{"error": {"message": "..."}}`
/// (OpenAI-compatible APIs); anything else is returned trimmed.
pub(crate) fn error_detail(body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        let error = &value["error"];
        if let Some(message) = error.as_str() {
            return message.to_string();
        }
        if let Some(message) = error["message"].as_str() {
            return message.to_string();
        }
    }

    let trimmed = body.trim();
    if trimmed.is_empty() {
        "no error detail in response".to_string()
    } else {
        trimmed.chars().take(MAX_ERROR_DETAIL_CHARS).collect()
    }
}

fn resolve_model(kind: &str, configured: &str, requested: Option<&str>) -> Result<String> {
    let model = requested.unwrap_or(configured).trim();
    if model.is_empty() {
        return Err(RagError::Input(format!("{} model must not be empty", kind)));
    }
    Ok(model.to_string())
}

/// Builds provider clients from configuration
#[derive(Debug, Clone)]
pub struct Providers {
    embedding: EmbeddingConfig,
    chat: ChatConfig,
}

impl Providers {
    #[inline]
    pub fn from_config(config: &Config) -> Self {
        Self {
            embedding: config.embedding.clone(),
            chat: config.chat.clone(),
        }
    }

    #[inline]
    pub fn embedding_config(&self) -> &EmbeddingConfig {
        &self.embedding
    }

    #[inline]
    pub fn chat_config(&self) -> &ChatConfig {
        &self.chat
    }

    /// Embedding client for the configured endpoint and the requested model
    #[inline]
    pub fn embedder(&self, model: Option<&str>) -> Result<Arc<dyn EmbeddingProvider>> {
        let model = resolve_model("Embedding", &self.embedding.model, model)?;
        debug!("Using embedding model {}", model);
        let client = OllamaClient::new(&self.embedding)?.with_model(model);
        Ok(Arc::new(client))
    }

    /// Chat client for the requested (or configured) provider and model
    #[inline]
    pub fn chat(
        &self,
        provider: Option<ChatProviderKind>,
        model: Option<&str>,
    ) -> Result<Arc<dyn ChatProvider>> {
        let provider = provider.unwrap_or(self.chat.provider);
        let model = resolve_model("Chat", &self.chat.model, model)?;
        let base_url = self.chat.base_url_for(provider);
        let timeout = Duration::from_secs(self.chat.timeout_secs);
        debug!("Using chat provider {} with model {}", provider, model);

        match provider {
            ChatProviderKind::Ollama => Ok(Arc::new(OllamaChat::new(base_url, model, timeout)?)),
            ChatProviderKind::OpenAi => {
                let api_key = std::env::var(&self.chat.api_key_env)
                    .ok()
                    .filter(|key| !key.trim().is_empty())
                    .ok_or_else(|| {
                        RagError::Input(format!(
                            "The openai chat provider needs an API key; set {}",
                            self.chat.api_key_env
                        ))
                    })?;
                Ok(Arc::new(OpenAiChat::new(base_url, api_key, model, timeout)?))
            }
        }
    }
}
