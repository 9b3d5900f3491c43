// Query module
// Answers a user message from the chunks of the active document


use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::chat::{ChatMessage, ChatProvider, Role};
use crate::config::Config;
use crate::database::{Chunk, DocumentSummary, VectorIndex};
use crate::embeddings::EmbeddingProvider;
use crate::providers::Providers;
use crate::retrieval::{SourceRef, assemble_context, retrieve};
use crate::{RagError, Result};

pub const SYSTEM_PROMPT: &str = "You are a helpful assistant answering questions about a document. \
Answer using only the context below. When a passage is marked with [Page N], cite the page \
number in your answer. If the context is empty or does not contain the answer, say that you \
cannot find the answer in the document.";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryRequest {
    pub message: String,
    #[serde(default)]
    pub history: Vec<ChatMessage>,
}

impl QueryRequest {
    #[inline]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            history: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryAnswer {
    pub reply: String,
    pub sources: Vec<SourceRef>,
}

/// Build the prompt: system instructions with the context, prior turns, then
/// the new message.
///
/// System turns in the supplied history are dropped; only the engine sets
/// instructions.
#[inline]
pub fn build_messages(context: &str, history: &[ChatMessage], message: &str) -> Vec<ChatMessage> {
    let system = if context.is_empty() {
        format!("{}\n\nContext:\n(no matching passages)", SYSTEM_PROMPT)
    } else {
        format!("{}\n\nContext:\n{}", SYSTEM_PROMPT, context)
    };

    let mut messages = Vec::with_capacity(history.len() + 2);
    messages.push(ChatMessage::system(system));
    messages.extend(
        history
            .iter()
            .filter(|turn| turn.role != Role::System)
            .cloned(),
    );
    messages.push(ChatMessage::user(message));
    messages
}

/// Reject a query vector that cannot be compared with the stored chunks.
///
/// A different model name with a matching length is only logged; Ollama
/// reports the same model under several tags.
fn check_query_embedding(
    document: &DocumentSummary,
    chunks: &[Chunk],
    query_model: &str,
    query_dimension: usize,
) -> Result<()> {
    let indexed_model = document.embedding_model.as_deref().unwrap_or("an unrecorded model");
    let stored_dimension = document
        .dimension
        .or_else(|| chunks.first().map(|c| c.embedding.len()));

    match stored_dimension {
        Some(dimension) if dimension != query_dimension => Err(RagError::Provider(format!(
            "Query embedded with '{}' has {} dimensions but '{}' was indexed with '{}' ({} dimensions). \
             Ask with embedding model '{}' or re-index the document",
            query_model,
            query_dimension,
            document.name,
            indexed_model,
            dimension,
            indexed_model
        ))),
        _ => {
            if document
                .embedding_model
                .as_deref()
                .is_some_and(|model| model != query_model)
            {
                warn!(
                    "Query embedded with '{}' but '{}' was indexed with '{}'",
                    query_model, document.name, indexed_model
                );
            }
            Ok(())
        }
    }
}

#[derive(Clone)]
pub struct QueryEngine {
    index: Arc<dyn VectorIndex>,
    top_k: usize,
}

impl QueryEngine {
    #[inline]
    pub fn new(index: Arc<dyn VectorIndex>, top_k: usize) -> Self {
        Self { index, top_k }
    }

    #[inline]
    pub fn from_config(config: &Config, index: Arc<dyn VectorIndex>) -> Self {
        Self::new(index, config.retrieval.top_k)
    }

    /// Embedder for a query: the requested model, else the model the active
    /// document was indexed with, else the configured default
    #[inline]
    pub async fn embedder_for(
        &self,
        providers: &Providers,
        requested: Option<&str>,
    ) -> Result<Arc<dyn EmbeddingProvider>> {
        let indexed = match requested {
            Some(_) => None,
            None => self
                .index
                .active_document()
                .await?
                .and_then(|document| document.embedding_model),
        };
        providers.embedder(requested.or(indexed.as_deref()))
    }

    /// One embedding call, one retrieval over the active document, one chat call
    #[inline]
    pub async fn answer(
        &self,
        request: &QueryRequest,
        embedder: &dyn EmbeddingProvider,
        chat: &dyn ChatProvider,
    ) -> Result<QueryAnswer> {
        let message = request.message.trim();
        if message.is_empty() {
            return Err(RagError::Input("Message must not be empty".to_string()));
        }

        let active = self.index.active_document().await?;
        let query_embedding = embedder.embed(message).await?;

        let chunks = match active {
            Some(document) => {
                let chunks = self.index.fetch_all(&document.name).await?;
                check_query_embedding(
                    &document,
                    &chunks,
                    embedder.model(),
                    query_embedding.len(),
                )?;
                chunks
            }
            None => {
                debug!("No document indexed; answering without context");
                Vec::new()
            }
        };

        let ranked = retrieve(&query_embedding, chunks, self.top_k);
        let context = assemble_context(&ranked);
        let messages = build_messages(&context, &request.history, message);

        info!(
            "Asking {} ({}) with {} context chunks",
            chat.name(),
            chat.model(),
            ranked.len()
        );
        let reply = chat.complete(&messages).await?;

        Ok(QueryAnswer {
            reply,
            sources: ranked.iter().map(SourceRef::from).collect(),
        })
    }
}
