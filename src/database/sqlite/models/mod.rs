
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::FromRow;

use crate::database::{Chunk, DocumentSummary};

#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct ChunkRow {
    pub filename: String,
    pub chunk_index: i64,
    pub page_number: Option<i64>,
    pub text: String,
    pub embedding: String,
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct DocumentRow {
    pub filename: String,
    pub indexed_at: DateTime<Utc>,
    pub embedding_model: Option<String>,
    pub dimension: Option<i64>,
    pub chunk_count: i64,
}

impl DocumentRow {
    #[inline]
    pub fn into_summary(self) -> Result<DocumentSummary> {
        Ok(DocumentSummary {
            chunk_count: usize::try_from(self.chunk_count).context("Invalid chunk count")?,
            dimension: self
                .dimension
                .map(usize::try_from)
                .transpose()
                .context("Invalid embedding dimension")?,
            embedding_model: self.embedding_model.filter(|m| !m.is_empty()),
            name: self.filename,
            indexed_at: self.indexed_at,
        })
    }
}

impl ChunkRow {
    #[inline]
    pub fn from_chunk(chunk: &Chunk) -> Result<Self> {
        Ok(Self {
            filename: chunk.document.clone(),
            chunk_index: i64::try_from(chunk.index).context("Chunk index out of range")?,
            page_number: chunk.page_number.map(i64::from),
            text: chunk.text.clone(),
            embedding: encode_embedding(&chunk.embedding)?,
        })
    }

    #[inline]
    pub fn into_chunk(self) -> Result<Chunk> {
        Ok(Chunk {
            index: usize::try_from(self.chunk_index)
                .with_context(|| format!("Invalid chunk index {}", self.chunk_index))?,
            page_number: self
                .page_number
                .map(u32::try_from)
                .transpose()
                .context("Invalid page number")?,
            embedding: decode_embedding(&self.embedding)
                .with_context(|| format!("Corrupt embedding for chunk {}", self.chunk_index))?,
            document: self.filename,
            text: self.text,
        })
    }
}

/// Serialize an embedding as a JSON array.
///
/// Values are widened to f64 first: every f32 is exactly representable as an
/// f64 and serde_json writes f64 in round-trip form, so decoding yields the
/// original bits.
#[inline]
pub fn encode_embedding(embedding: &[f32]) -> Result<String> {
    let widened: Vec<f64> = embedding.iter().copied().map(f64::from).collect();
    serde_json::to_string(&widened).context("Failed to serialize embedding")
}

#[inline]
pub fn decode_embedding(encoded: &str) -> Result<Vec<f32>> {
    let widened: Vec<f64> =
        serde_json::from_str(encoded).context("Failed to parse stored embedding")?;
    Ok(widened.into_iter().map(|v| v as f32).collect())
}
