
use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::debug;

use super::{Chunk, DocumentSummary, VectorIndex, check_dimension, check_documents};
use crate::{RagError, Result};

#[derive(Debug)]
struct StoredDocument {
    indexed_at: DateTime<Utc>,
    embedding_model: String,
    dimension: Option<usize>,
    chunks: Vec<Chunk>,
}

/// Process-local index; contents are lost when it is dropped
#[derive(Debug, Default)]
pub struct MemoryIndex {
    documents: RwLock<HashMap<String, StoredDocument>>,
}

impl MemoryIndex {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VectorIndex for MemoryIndex {
    #[inline]
    async fn replace_all(
        &self,
        document: &str,
        embedding_model: &str,
        chunks: Vec<Chunk>,
    ) -> Result<()> {
        let dimension = check_documents(document, &chunks)?;

        debug!(
            "Replacing memory index with {} chunks of {} ({})",
            chunks.len(),
            document,
            embedding_model
        );
        let mut replacement = HashMap::with_capacity(1);
        replacement.insert(
            document.to_string(),
            StoredDocument {
                indexed_at: Utc::now(),
                embedding_model: embedding_model.to_string(),
                dimension,
                chunks,
            },
        );

        *self.documents.write().await = replacement;
        Ok(())
    }

    #[inline]
    async fn insert_incremental(&self, chunk: Chunk) -> Result<()> {
        let mut documents = self.documents.write().await;
        let stored = documents.get_mut(&chunk.document).ok_or_else(|| {
            RagError::Input(format!(
                "'{}' is not the active document; replace the index first",
                chunk.document
            ))
        })?;

        if stored.chunks.iter().any(|c| c.index == chunk.index) {
            return Err(RagError::Input(format!(
                "Chunk index {} is already stored for '{}'",
                chunk.index, chunk.document
            )));
        }

        match stored.dimension {
            Some(expected) => check_dimension(expected, &chunk)?,
            None => stored.dimension = Some(chunk.embedding.len()),
        }

        stored.chunks.push(chunk);
        Ok(())
    }

    #[inline]
    async fn fetch_all(&self, document: &str) -> Result<Vec<Chunk>> {
        Ok(self
            .documents
            .read()
            .await
            .get(document)
            .map(|stored| stored.chunks.clone())
            .unwrap_or_default())
    }

    #[inline]
    async fn active_document(&self) -> Result<Option<DocumentSummary>> {
        Ok(self
            .documents
            .read()
            .await
            .iter()
            .next()
            .map(|(name, stored)| DocumentSummary {
                name: name.clone(),
                chunk_count: stored.chunks.len(),
                indexed_at: stored.indexed_at,
                embedding_model: Some(stored.embedding_model.clone()),
                dimension: stored.dimension,
            }))
    }
}
