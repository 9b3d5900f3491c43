
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::config::EmbeddingConfig;
use crate::embeddings::EmbeddingProvider;
use crate::providers::{build_agent, error_detail};
use crate::{RagError, Result};

/// Client for an Ollama-compatible embedding endpoint
#[derive(Debug, Clone)]
pub struct OllamaClient {
    base_url: Url,
    model: String,
    agent: ureq::Agent,
}

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embedding: Vec<f32>,
}

#[derive(Debug, Deserialize)]
pub struct ModelInfo {
    pub name: String,
    pub size: Option<u64>,
    pub digest: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ModelsResponse {
    models: Vec<ModelInfo>,
}

impl OllamaClient {
    #[inline]
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let base_url = config.endpoint_url()?;

        Ok(Self {
            base_url,
            model: config.model.clone(),
            agent: build_agent(Duration::from_secs(config.timeout_secs)),
        })
    }

    #[inline]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.agent = build_agent(timeout);
        self
    }

    #[inline]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    #[inline]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Test connection to the provider and verify model availability
    #[inline]
    pub fn health_check(&self) -> Result<()> {
        debug!("Performing health check for Ollama at {}", self.base_url);

        self.ping()?;
        self.validate_model()?;

        info!(
            "Health check passed for Ollama server at {} with model {}",
            self.base_url, self.model
        );
        Ok(())
    }

    /// Ping the Ollama server to check if it's responsive
    #[inline]
    pub fn ping(&self) -> Result<()> {
        self.get("/api/tags")?;
        debug!("Server ping successful");
        Ok(())
    }

    /// Validate that the configured model is installed
    #[inline]
    pub fn validate_model(&self) -> Result<()> {
        debug!("Validating model: {}", self.model);

        let models = self.list_models()?;
        let tagged = format!("{}:latest", self.model);

        if models
            .iter()
            .any(|m| m.name == self.model || m.name == tagged)
        {
            debug!("Model {} is available", self.model);
            Ok(())
        } else {
            let available_models: Vec<&str> = models.iter().map(|m| m.name.as_str()).collect();
            warn!(
                "Model {} not found. Available models: {:?}",
                self.model, available_models
            );
            Err(RagError::Provider(format!(
                "Model '{}' is not installed on {}. Available models: {:?}",
                self.model, self.base_url, available_models
            )))
        }
    }

    /// List all installed models
    #[inline]
    pub fn list_models(&self) -> Result<Vec<ModelInfo>> {
        let response_text = self.get("/api/tags")?;

        let models_response: ModelsResponse = serde_json::from_str(&response_text)
            .map_err(|e| RagError::Provider(format!("Failed to parse models response: {}", e)))?;

        debug!("Found {} models", models_response.models.len());
        Ok(models_response.models)
    }

    /// Generate an embedding for a single text input
    #[inline]
    pub fn generate_embedding(&self, text: &str) -> Result<Vec<f32>> {
        debug!("Generating embedding for text (length: {})", text.len());

        let url = self.endpoint("/api/embeddings")?;
        let request = EmbedRequest {
            model: &self.model,
            prompt: text,
        };
        let request_json = serde_json::to_string(&request).map_err(|e| {
            RagError::Provider(format!("Failed to serialize embedding request: {}", e))
        })?;

        let mut response = self
            .agent
            .post(url.as_str())
            .header("Content-Type", "application/json")
            .send(&request_json)
            .map_err(|e| {
                error!("Embedding request to {} failed: {}", url, e);
                RagError::Provider(format!(
                    "Failed to reach embedding provider at {}: {}",
                    self.base_url, e
                ))
            })?;

        let status = response.status();
        let body = response.body_mut().read_to_string().map_err(|e| {
            RagError::Provider(format!("Failed to read embedding response: {}", e))
        })?;

        if !status.is_success() {
            let detail = error_detail(&body);
            error!(
                "Embedding provider returned HTTP {} for model {}: {}",
                status.as_u16(),
                self.model,
                detail
            );
            return Err(RagError::Provider(format!(
                "Embedding provider returned HTTP {} for model '{}': {}. \
                 The model may not be installed; try `ollama pull {}`",
                status.as_u16(),
                self.model,
                detail,
                self.model
            )));
        }

        let embed_response: EmbedResponse = serde_json::from_str(&body).map_err(|e| {
            RagError::Provider(format!(
                "Malformed embedding response for model '{}': {}",
                self.model, e
            ))
        })?;

        if embed_response.embedding.is_empty() {
            return Err(RagError::Provider(format!(
                "Embedding provider returned an empty vector for model '{}'. \
                 Check that '{}' is an embedding model",
                self.model, self.model
            )));
        }

        debug!(
            "Generated embedding with {} dimensions",
            embed_response.embedding.len()
        );

        Ok(embed_response.embedding)
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .map_err(|e| RagError::Config(format!("Failed to build URL for {}: {}", path, e)))
    }

    fn get(&self, path: &str) -> Result<String> {
        let url = self.endpoint(path)?;
        debug!("GET {}", url);

        let mut response = self.agent.get(url.as_str()).call().map_err(|e| {
            RagError::Provider(format!(
                "Failed to reach embedding provider at {}: {}",
                self.base_url, e
            ))
        })?;

        let status = response.status();
        let body = response
            .body_mut()
            .read_to_string()
            .map_err(|e| RagError::Provider(format!("Failed to read response: {}", e)))?;

        if !status.is_success() {
            return Err(RagError::Provider(format!(
                "Embedding provider returned HTTP {} for {}: {}",
                status.as_u16(),
                path,
                error_detail(&body)
            )));
        }

        Ok(body)
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaClient {
    #[inline]
    fn model(&self) -> &str {
        &self.model
    }

    #[inline]
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let client = self.clone();
        let text = text.to_string();
        tokio::task::spawn_blocking(move || client.generate_embedding(&text))
            .await
            .map_err(|e| RagError::Provider(format!("Embedding task failed: {}", e)))?
    }
}
