// Embeddings module
// Character-window chunking and the embedding provider seam

pub mod chunking;
pub mod ollama;

use async_trait::async_trait;

use crate::Result;

pub use chunking::{TextChunk, Window, chunk_document, chunk_text, sliding_windows};
pub use ollama::{ModelInfo, OllamaClient};

/// Maps text to a fixed-length vector.
///
/// One call is made per chunk while indexing and one per user query. Failures
/// surface as [`crate::RagError::Provider`] and are never retried here.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Model name the provider embeds with
    fn model(&self) -> &str;

    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}
