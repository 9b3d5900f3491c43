use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error};
use url::Url;

use super::{ChatMessage, ChatProvider};
use crate::providers::{build_agent, error_detail};
use crate::{RagError, Result};

/// Chat client for OpenAI-compatible `/v1/chat/completions` endpoints
#[derive(Clone)]
pub struct OpenAiChat {
    endpoint: Url,
    api_key: String,
    model: String,
    agent: ureq::Agent,
}

impl std::fmt::Debug for OpenAiChat {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiChat")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

impl OpenAiChat {
    #[inline]
    pub fn new(
        base_url: &str,
        api_key: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let endpoint = Url::parse(base_url)
            .and_then(|url| url.join("/v1/chat/completions"))
            .map_err(|e| RagError::Config(format!("Invalid OpenAI URL {}: {}", base_url, e)))?;

        Ok(Self {
            endpoint,
            api_key: api_key.into(),
            model: model.into(),
            agent: build_agent(timeout),
        })
    }

    fn complete_blocking(&self, messages: &[ChatMessage]) -> Result<String> {
        let request = CompletionRequest {
            model: &self.model,
            messages,
        };
        let request_json = serde_json::to_string(&request)
            .map_err(|e| RagError::Provider(format!("Failed to serialize chat request: {}", e)))?;

        debug!(
            "Sending {} messages to OpenAI chat model {}",
            messages.len(),
            self.model
        );

        let mut response = self
            .agent
            .post(self.endpoint.as_str())
            .header("Content-Type", "application/json")
            .header("Authorization", &format!("Bearer {}", self.api_key))
            .send(&request_json)
            .map_err(|e| {
                RagError::Provider(format!(
                    "Failed to reach OpenAI chat at {}: {}",
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
            error!("OpenAI chat returned HTTP {}: {}", status.as_u16(), detail);
            return Err(RagError::Provider(format!(
                "OpenAI chat returned HTTP {} for model '{}': {}",
                status.as_u16(),
                self.model,
                detail
            )));
        }

        let parsed: CompletionResponse = serde_json::from_str(&body).map_err(|e| {
            RagError::Provider(format!(
                "Malformed OpenAI chat response for model '{}': {}",
                self.model, e
            ))
        })?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| {
                RagError::Provider(format!(
                    "OpenAI chat response for model '{}' contained no reply",
                    self.model
                ))
            })
    }
}

#[async_trait]
impl ChatProvider for OpenAiChat {
    #[inline]
    fn name(&self) -> &'static str {
        "openai"
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
