use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error};
use url::Url;

use super::{ChatMessage, ChatProvider};
use crate::providers::{build_agent, error_detail};
use crate::{RagError, Result};

/// Chat client for a local Ollama server (`/api/chat`, non-streaming)
#[derive(Debug, Clone)]
pub struct OllamaChat {
    endpoint: Url,
    model: String,
    agent: ureq::Agent,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: String,
}

impl OllamaChat {
    #[inline]
    pub fn new(base_url: &str, model: impl Into<String>, timeout: Duration) -> Result<Self> {
        let endpoint = Url::parse(base_url)
            .and_then(|url| url.join("/api/chat"))
            .map_err(|e| RagError::Config(format!("Invalid Ollama URL {}: {}", base_url, e)))?;

        Ok(Self {
            endpoint,
            model: model.into(),
            agent: build_agent(timeout),
        })
    }

    fn complete_blocking(&self, messages: &[ChatMessage]) -> Result<String> {
        let request = ChatRequest {
            model: &self.model,
            messages,
            stream: false,
        };
        let request_json = serde_json::to_string(&request)
            .map_err(|e| RagError::Provider(format!("Failed to serialize chat request: {}", e)))?;

        debug!(
            "Sending {} messages to Ollama chat model {}",
            messages.len(),
            self.model
        );

        let mut response = self
            .agent
            .post(self.endpoint.as_str())
            .header("Content-Type", "application/json")
            .send(&request_json)
            .map_err(|e| {
                RagError::Provider(format!(
                    "Failed to reach Ollama chat at {}: {}",
                    self.endpoint, e
                ))
            })?;

        let status = response.status();
        let body = response
            .body_mut()
            .read_to_string()
            .map_err(|e| RagError::Provider(format!("Failed to read chat response: {}", e)))?;

        if !status.is_success() {
            let detail = error_detail(&body);
            error!("Ollama chat returned HTTP {}: {}", status.as_u16(), detail);
            return Err(RagError::Provider(format!(
                "Ollama chat returned HTTP {} for model '{}': {}. \
                 The model may not be installed; try `ollama pull {}`",
                status.as_u16(),
                self.model,
                detail,
                self.model
            )));
        }

        let parsed: ChatResponse = serde_json::from_str(&body).map_err(|e| {
            RagError::Provider(format!(
                "Malformed Ollama chat response for model '{}': {}",
                self.model, e
            ))
        })?;

        Ok(parsed.message.content)
    }
}

#[async_trait]
impl ChatProvider for OllamaChat {
    #[inline]
    fn name(&self) -> &'static str {
        "ollama"
    }

    #[inline]
    fn model(&self) -> &str {
        &self.model
    }

    #[inline]
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        let client = self.clone();
        let messages = messages.to_vec();
        tokio::task::spawn_blocking(move || client.complete_blocking(&messages))
            .await
            .map_err(|e| RagError::Provider(format!("Chat task failed: {}", e)))?
    }
}
