//! Splitting blocks into bounded, provenance-tagged chunks.
//!
//! [`RecursiveChunker`] tries a prioritised list of separators (paragraph
//! break, line break, sentence punctuation, space, then any character
//! boundary). Pieces that still exceed the size limit are split again with
//! the next separator; pieces that fit are merged greedily back into chunks,
//! keeping a tail of the previous chunk as overlap. Sizes are measured in
//! characters, not bytes.

use std::collections::VecDeque;

use tracing::debug;

use crate::config::EngineConfig;
use crate::document::{Block, Chunk};
use crate::error::{RagError, Result};

/// A strategy for splitting block content into passages.
///
/// Implementors only decide where text is cut. [`chunk`](Chunker::chunk)
/// attaches provenance and drops blank passages, so every strategy yields
/// chunks that inherit their block's heading and page number verbatim.
pub trait Chunker: Send + Sync {
    /// Split one block's content into passages.
    fn split(&self, text: &str) -> Vec<String>;

    /// Split every non-empty block into chunks, in block order.
    fn chunk(&self, blocks: &[Block]) -> Vec<Chunk> {
        let mut chunks = Vec::new();
        for block in blocks {
            if block.content.trim().is_empty() {
                continue;
            }
            for piece in self.split(&block.content) {
                let text = piece.trim();
                if text.is_empty() {
                    continue;
                }
                chunks.push(Chunk::new(text, block.page_number, block.heading.clone()));
            }
        }
        chunks
    }
}

/// Splits text recursively by a prioritised separator list, with overlap.
///
/// # Example
///
/// ```rust,ignore
/// use delineate_rag::RecursiveChunker;
///
/// let chunker = RecursiveChunker::new(512, 128);
/// let chunks = chunker.chunk(&segmentation.blocks);
/// ```
#[derive(Debug, Clone)]
pub struct RecursiveChunker {
    chunk_size: usize,
    chunk_overlap: usize,
    separators: Vec<String>,
}

impl RecursiveChunker {
    /// Create a chunker with the default separator priority.
    ///
    /// # Arguments
    ///
    /// * `chunk_size` — maximum number of characters per chunk
    /// * `chunk_overlap` — number of overlapping characters between consecutive chunks
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self { chunk_size, chunk_overlap, separators: EngineConfig::default().separators }
    }

    /// Create a chunker from the chunking settings of an [`EngineConfig`].
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            chunk_size: config.chunk_size,
            chunk_overlap: config.chunk_overlap,
            separators: config.separators.clone(),
        }
    }

    /// Replace the separator priority list.
    pub fn with_separators<I, S>(mut self, separators: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.separators = separators.into_iter().map(Into::into).collect();
        self
    }

    fn split_recursive(&self, text: &str, separators: &[String]) -> Vec<String> {
        // The first separator present in the text wins; "" always matches.
        let position = separators.iter().position(|sep| sep.is_empty() || text.contains(sep.as_str()));
        let (separator, remaining) = match position {
            Some(i) => (separators[i].as_str(), &separators[i + 1..]),
            None => match separators.last() {
                Some(last) => (last.as_str(), &separators[separators.len()..]),
                None => ("", &separators[..0]),
            },
        };

        let pieces: Vec<String> = if separator.is_empty() {
            text.chars().map(String::from).collect()
        } else {
            split_keeping_separator(text, separator).into_iter().map(str::to_string).collect()
        };

        let mut output = Vec::new();
        let mut fitting: Vec<String> = Vec::new();

        for piece in pieces {
            if char_len(&piece) <= self.chunk_size {
                fitting.push(piece);
                continue;
            }
            if !fitting.is_empty() {
                output.extend(self.merge(&fitting));
                fitting.clear();
            }
            if remaining.is_empty() {
                // Indivisible with the configured separators.
                output.push(piece);
            } else {
                output.extend(self.split_recursive(&piece, remaining));
            }
        }

        if !fitting.is_empty() {
            output.extend(self.merge(&fitting));
        }

        output
    }

    /// Greedily merge pieces into chunks of at most `chunk_size` characters,
    /// carrying up to `chunk_overlap` characters of trailing pieces forward.
    fn merge(&self, pieces: &[String]) -> Vec<String> {
        let mut chunks = Vec::new();
        let mut window: VecDeque<(&str, usize)> = VecDeque::new();
        let mut total = 0;

        for piece in pieces {
            let len = char_len(piece);
            if total + len > self.chunk_size && !window.is_empty() {
                chunks.push(join(&window));
                while total > self.chunk_overlap || (total + len > self.chunk_size && total > 0) {
                    match window.pop_front() {
                        Some((_, dropped)) => total -= dropped,
                        None => break,
                    }
                }
            }
            window.push_back((piece.as_str(), len));
            total += len;
        }

        if !window.is_empty() {
            chunks.push(join(&window));
        }

        chunks
    }
}

impl Chunker for RecursiveChunker {
    fn split(&self, text: &str) -> Vec<String> {
        if text.is_empty() {
            return Vec::new();
        }
        self.split_recursive(text, &self.separators)
    }
}

/// Check that a chunk set carries enough content to be worth indexing.
///
/// # Errors
///
/// Returns [`RagError::InsufficientContent`] if there are no chunks, or if no
/// chunk's trimmed text is longer than `min_meaningful_chars` characters.
pub fn validate_chunks(chunks: &[Chunk], min_meaningful_chars: usize) -> Result<()> {
    if chunks.is_empty() {
        return Err(RagError::InsufficientContent {
            chunk_count: 0,
            message: "no valid text chunks could be created from the document".to_string(),
        });
    }

    let meaningful =
        chunks.iter().filter(|c| char_len(c.text.trim()) > min_meaningful_chars).count();
    if meaningful == 0 {
        return Err(RagError::InsufficientContent {
            chunk_count: chunks.len(),
            message: "document content appears to be too short or fragmented".to_string(),
        });
    }

    debug!(chunk_count = chunks.len(), meaningful, "validated chunks");
    Ok(())
}

/// Split text at a separator while keeping the separator attached to the preceding segment.
fn split_keeping_separator<'a>(text: &'a str, separator: &str) -> Vec<&'a str> {
    let mut result = Vec::new();
    let mut start = 0;

    while let Some(pos) = text[start..].find(separator) {
        let end = start + pos + separator.len();
        result.push(&text[start..end]);
        start = end;
    }

    if start < text.len() {
        result.push(&text[start..]);
    }

    result
}

fn join(window: &VecDeque<(&str, usize)>) -> String {
    window.iter().map(|(piece, _)| *piece).collect()
}

pub(crate) fn char_len(text: &str) -> usize {
    text.chars().count()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(heading: &str, page: usize, content: &str) -> Block {
        Block { page_number: page, heading: heading.into(), content: content.into() }
    }

    #[test]
    fn short_block_is_one_chunk() {
        let chunker = RecursiveChunker::new(100, 20);
        let chunks = chunker.chunk(&[block("1. Intro", 3, "  A short paragraph.  ")]);
        assert_eq!(chunks, vec![Chunk::new("A short paragraph.", 3, "1. Intro")]);
    }

    #[test]
    fn prefers_paragraph_boundaries() {
        let chunker = RecursiveChunker::new(30, 0);
        let text = "First paragraph is here.\n\nSecond paragraph is here.";
        let pieces: Vec<String> =
            chunker.split(text).into_iter().map(|p| p.trim().to_string()).collect();
        assert_eq!(pieces, vec!["First paragraph is here.", "Second paragraph is here."]);
    }

    #[test]
    fn respects_size_limit_and_overlaps() {
        let chunker = RecursiveChunker::new(20, 8);
        let text = "alpha beta gamma delta epsilon zeta eta theta iota kappa";
        let pieces = chunker.split(text);
        assert!(pieces.len() > 1);
        for piece in &pieces {
            assert!(char_len(piece) <= 20, "{piece:?} exceeds the limit");
        }
        // Consecutive chunks share at least one word.
        for pair in pieces.windows(2) {
            let last_word = pair[0].split_whitespace().last().unwrap();
            assert!(pair[1].contains(last_word), "{pair:?} has no overlap");
        }
    }

    #[test]
    fn hard_splits_long_tokens() {
        let chunker = RecursiveChunker::new(10, 2);
        let pieces = chunker.split("abcdefghijklmnopqrstuvwxyz");
        assert!(pieces.iter().all(|p| char_len(p) <= 10));
        assert_eq!(pieces.first().map(String::as_str), Some("abcdefghij"));
    }

    #[test]
    fn oversized_token_survives_without_character_fallback() {
        let chunker = RecursiveChunker::new(5, 0).with_separators([" "]);
        let pieces = chunker.split("tiny enormousword");
        assert!(pieces.iter().any(|p| p.contains("enormousword")));
    }

    #[test]
    fn multibyte_text_is_measured_in_characters() {
        let chunker = RecursiveChunker::new(4, 1);
        let pieces = chunker.split("ééééééééé");
        assert!(pieces.iter().all(|p| char_len(p) <= 4));
    }

    #[test]
    fn chunks_keep_block_provenance() {
        let chunker = RecursiveChunker::new(15, 3);
        let blocks = [
            block("2. Methodology", 4, "We sampled widely. We measured carefully."),
            block("3. Results", 5, "   "),
        ];
        let chunks = chunker.chunk(&blocks);
        assert!(chunks.len() > 1);
        assert!(chunks.iter().all(|c| c.heading == "2. Methodology" && c.page_number == 4));
        assert!(chunks.iter().all(|c| !c.text.trim().is_empty()));
    }

    #[test]
    fn validation_requires_a_meaningful_chunk() {
        assert!(matches!(
            validate_chunks(&[], 10).unwrap_err(),
            RagError::InsufficientContent { chunk_count: 0, .. }
        ));
        let tiny = [Chunk::new("ok", 1, "h"), Chunk::new("fine", 1, "h")];
        assert!(matches!(
            validate_chunks(&tiny, 10).unwrap_err(),
            RagError::InsufficientContent { chunk_count: 2, .. }
        ));
        let good = [Chunk::new("ok", 1, "h"), Chunk::new("a full sentence of text", 1, "h")];
        assert!(validate_chunks(&good, 10).is_ok());
    }
}
