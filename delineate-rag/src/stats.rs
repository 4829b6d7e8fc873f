//! Aggregate statistics over retrieved and indexed chunks.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::document::{Chunk, RetrievedChunk};

/// Statistics over the chunks of one retrieval result.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchStats {
    /// Number of returned chunks.
    pub total_chunks: usize,
    /// Number of distinct pages among them.
    pub unique_pages: usize,
    /// Number of distinct headings among them.
    pub unique_headings: usize,
    /// Mean rerank score; unranked chunks count as zero.
    pub avg_rerank_score: f32,
    /// Lowest and highest rerank score.
    pub score_range: (f32, f32),
}

impl SearchStats {
    /// Compute statistics from a ranked chunk list. Empty input gives all zeros.
    pub fn from_chunks(chunks: &[RetrievedChunk]) -> Self {
        if chunks.is_empty() {
            return Self::default();
        }

        let unique_pages = chunks.iter().map(|c| c.chunk.page_number).collect::<HashSet<_>>().len();
        let unique_headings =
            chunks.iter().map(|c| c.chunk.heading.as_str()).collect::<HashSet<_>>().len();

        let scores: Vec<f32> = chunks.iter().map(|c| c.rerank_score.unwrap_or(0.0)).collect();
        let avg_rerank_score = scores.iter().sum::<f32>() / scores.len() as f32;
        let min = scores.iter().copied().fold(f32::INFINITY, f32::min);
        let max = scores.iter().copied().fold(f32::NEG_INFINITY, f32::max);

        Self {
            total_chunks: chunks.len(),
            unique_pages,
            unique_headings,
            avg_rerank_score,
            score_range: (min, max),
        }
    }
}

/// Size summary of an indexed chunk set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CorpusSummary {
    /// Number of chunks.
    pub total_chunks: usize,
    /// Whitespace-separated words across all chunks.
    pub total_words: usize,
    /// Mean words per chunk, rounded to one decimal.
    pub avg_chunk_words: f32,
    /// Number of distinct pages.
    pub unique_pages: usize,
    /// Number of distinct headings.
    pub unique_headings: usize,
}

impl CorpusSummary {
    /// Summarise a chunk set. Empty input gives all zeros.
    pub fn from_chunks(chunks: &[Chunk]) -> Self {
        if chunks.is_empty() {
            return Self::default();
        }

        let total_words: usize = chunks.iter().map(|c| c.text.split_whitespace().count()).sum();
        let avg = total_words as f32 / chunks.len() as f32;

        Self {
            total_chunks: chunks.len(),
            total_words,
            avg_chunk_words: (avg * 10.0).round() / 10.0,
            unique_pages: chunks.iter().map(|c| c.page_number).collect::<HashSet<_>>().len(),
            unique_headings: chunks.iter().map(|c| c.heading.as_str()).collect::<HashSet<_>>().len(),
        }
    }
}
