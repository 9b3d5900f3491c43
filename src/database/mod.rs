// Database module
// Vector index strategies holding the chunks of the active document

pub mod memory;
pub mod sqlite;


use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use crate::config::{Config, StoreBackend};
use crate::{RagError, Result};

pub use memory::MemoryIndex;
pub use sqlite::SqliteIndex;

/// One embedded window of a document
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    /// Name of the document the chunk belongs to
    pub document: String,
    /// 0-based position in the indexing run
    pub index: usize,
    pub page_number: Option<u32>,
    pub text: String,
    pub embedding: Vec<f32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentSummary {
    pub name: String,
    pub chunk_count: usize,
    pub indexed_at: DateTime<Utc>,
    /// Model the chunks were embedded with; `None` for documents stored
    /// before the model was recorded
    pub embedding_model: Option<String>,
    /// Length of every stored embedding; `None` until the first chunk lands
    pub dimension: Option<usize>,
}

/// Storage for the chunks of the single active document.
///
/// Chunks are immutable once written. The only mutation besides appending is
/// replacing the whole collection, which also changes the active document.
/// A query racing a re-index may observe either state.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Discard every stored chunk and make `document` the active document
    /// holding exactly `chunks`, embedded with `embedding_model`.
    async fn replace_all(
        &self,
        document: &str,
        embedding_model: &str,
        chunks: Vec<Chunk>,
    ) -> Result<()>;

    /// Append one chunk to the active document.
    ///
    /// The first chunk fixes the document's dimension when `replace_all` was
    /// given no chunks; later chunks must match it.
    async fn insert_incremental(&self, chunk: Chunk) -> Result<()>;

    /// All chunks stored for `document`, in no particular order.
    async fn fetch_all(&self, document: &str) -> Result<Vec<Chunk>>;

    async fn active_document(&self) -> Result<Option<DocumentSummary>>;
}

/// Open the index backend selected in the configuration
#[inline]
pub async fn open_index(config: &Config) -> Result<Arc<dyn VectorIndex>> {
    match config.store.backend {
        StoreBackend::Memory => {
            info!("Using in-memory vector index");
            Ok(Arc::new(MemoryIndex::new()))
        }
        StoreBackend::Sqlite => {
            let path = config.database_path();
            info!("Using SQLite vector index at {}", path.display());
            Ok(Arc::new(SqliteIndex::open(&path).await?))
        }
    }
}

/// Validate a replacement set, returning the shared embedding dimension
pub(crate) fn check_documents(document: &str, chunks: &[Chunk]) -> Result<Option<usize>> {
    if document.trim().is_empty() {
        return Err(RagError::Input("Document name must not be empty".to_string()));
    }

    if let Some(stray) = chunks.iter().find(|c| c.document != document) {
        return Err(RagError::Input(format!(
            "Chunk {} belongs to '{}', not '{}'",
            stray.index, stray.document, document
        )));
    }

    let mut seen = std::collections::HashSet::with_capacity(chunks.len());
    if let Some(duplicate) = chunks.iter().find(|c| !seen.insert(c.index)) {
        return Err(RagError::Input(format!(
            "Chunk index {} appears more than once",
            duplicate.index
        )));
    }

    let dimension = chunks.first().map(|c| c.embedding.len());
    if let Some(expected) = dimension {
        for chunk in chunks {
            check_dimension(expected, chunk)?;
        }
    }

    Ok(dimension)
}

pub(crate) fn check_dimension(expected: usize, chunk: &Chunk) -> Result<()> {
    if chunk.embedding.len() == expected {
        Ok(())
    } else {
        Err(RagError::Input(format!(
            "Chunk {} of '{}' has {} dimensions but the document has {}",
            chunk.index,
            chunk.document,
            chunk.embedding.len(),
            expected
        )))
    }
}
