// Retrieval module
// Cosine scoring, top-k ranking and prompt context assembly

pub mod context;


use std::cmp::Ordering;

use serde::Serialize;
use tracing::debug;

use crate::database::Chunk;

pub use context::{CONTEXT_SEPARATOR, assemble_context};

#[derive(Debug, Clone, PartialEq)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    pub score: f32,
}

/// Where a retrieved chunk came from, as reported back to the user
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceRef {
    pub index: usize,
    pub page_number: Option<u32>,
    pub score: f32,
}

impl From<&ScoredChunk> for SourceRef {
    #[inline]
    fn from(scored: &ScoredChunk) -> Self {
        Self {
            index: scored.chunk.index,
            page_number: scored.chunk.page_number,
            score: scored.score,
        }
    }
}

/// Cosine similarity of two vectors, in `[-1, 1]`.
///
/// Zero-magnitude inputs and vectors of different lengths score 0.
#[inline]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    // Accumulate in f64 so long vectors don't drift away from 1.0 on self-similarity
    let (dot, norm_a, norm_b) = a.iter().zip(b).fold(
        (0.0_f64, 0.0_f64, 0.0_f64),
        |(dot, norm_a, norm_b), (&x, &y)| {
            let (x, y) = (f64::from(x), f64::from(y));
            (dot + x * y, norm_a + x * x, norm_b + y * y)
        },
    );

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    let score = dot / (norm_a.sqrt() * norm_b.sqrt());
    if score.is_nan() {
        return 0.0;
    }
    score.clamp(-1.0, 1.0) as f32
}

/// Rank `chunks` against `query` and keep the best `k`.
///
/// Ties are broken by chunk index, so the result is deterministic regardless
/// of the order the store returned the chunks in.
#[inline]
pub fn retrieve(query: &[f32], chunks: Vec<Chunk>, k: usize) -> Vec<ScoredChunk> {
    let total = chunks.len();
    let mut scored: Vec<ScoredChunk> = chunks
        .into_iter()
        .map(|chunk| ScoredChunk {
            score: cosine_similarity(query, &chunk.embedding),
            chunk,
        })
        .collect();

    scored.sort_by(|a, b| match b.score.total_cmp(&a.score) {
        Ordering::Equal => a.chunk.index.cmp(&b.chunk.index),
        ordering => ordering,
    });
    scored.truncate(k);

    debug!(
        "Retrieved {} of {} chunks (best score {:?})",
        scored.len(),
        total,
        scored.first().map(|s| s.score)
    );

    scored
}
