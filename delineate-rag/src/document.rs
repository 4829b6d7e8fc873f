//! Data types for blocks, chunks, and retrieved passages.

use serde::{Deserialize, Serialize};

/// A contiguous run of text following a detected heading on one page.
///
/// Produced by the [`Segmenter`](crate::segmenter::Segmenter) and consumed
/// by the [`RecursiveChunker`](crate::chunking::RecursiveChunker).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Block {
    /// One-based page number the text was found on.
    pub page_number: usize,
    /// The heading in effect when the text was read.
    pub heading: String,
    /// The trimmed body text.
    pub content: String,
}

/// A bounded passage of document text carrying page and heading provenance.
///
/// Chunks are immutable once created. Per-query scores live on
/// [`RetrievedChunk`], never on the chunk itself.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Chunk {
    /// Trimmed, non-empty passage text.
    pub text: String,
    /// One-based page number inherited from the source block.
    pub page_number: usize,
    /// Heading inherited from the source block.
    pub heading: String,
}

impl Chunk {
    /// Create a chunk from its parts.
    pub fn new(text: impl Into<String>, page_number: usize, heading: impl Into<String>) -> Self {
        Self { text: text.into(), page_number, heading: heading.into() }
    }
}

/// A query-scoped copy of a [`Chunk`] with the scores attached during retrieval.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetrievedChunk {
    /// The retrieved chunk.
    pub chunk: Chunk,
    /// Squared Euclidean distance from the query vector (lower is closer).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub similarity_score: Option<f32>,
    /// Cross-encoder relevance score (higher is more relevant).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rerank_score: Option<f32>,
}

impl RetrievedChunk {
    /// Wrap a chunk without any scores.
    pub fn unscored(chunk: Chunk) -> Self {
        Self { chunk, similarity_score: None, rerank_score: None }
    }

    /// Wrap a chunk found by vector search at the given distance.
    pub fn with_distance(chunk: Chunk, distance: f32) -> Self {
        Self { chunk, similarity_score: Some(distance), rerank_score: None }
    }

    /// The passage text.
    pub fn text(&self) -> &str {
        &self.chunk.text
    }
}
