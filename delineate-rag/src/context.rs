//! Formatting ranked passages into a provenance-annotated context block.

use crate::document::RetrievedChunk;

/// Returned instead of an empty string when there is nothing to assemble.
pub const NO_CONTEXT: &str = "No relevant context found.";

/// Context reported when retrieval itself failed.
pub const RETRIEVAL_ERROR_CONTEXT: &str = "Error occurred during retrieval.";

/// Join ranked chunks into one context string, best first.
///
/// Each chunk becomes a block headed by its page number and section, and
/// blocks are separated by a blank line:
///
/// ```text
/// --- Context from Page 4, Section: 2. Methodology ---
/// We sampled widely.
/// ```
pub fn assemble_context(chunks: &[RetrievedChunk]) -> String {
    if chunks.is_empty() {
        return NO_CONTEXT.to_string();
    }

    chunks
        .iter()
        .map(|c| {
            format!(
                "--- Context from Page {}, Section: {} ---\n{}",
                c.chunk.page_number, c.chunk.heading, c.chunk.text
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Format a citation the way answers reference their sources.
pub fn format_citation(page_number: usize, heading: &str) -> String {
    format!("[Page {page_number}, {heading}]")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Chunk;

    #[test]
    fn empty_input_yields_sentinel() {
        assert_eq!(assemble_context(&[]), NO_CONTEXT);
    }

    #[test]
    fn blocks_keep_rank_order_and_provenance() {
        let chunks = vec![
            RetrievedChunk::unscored(Chunk::new("Second best.", 7, "3. Results")),
            RetrievedChunk::unscored(Chunk::new("Third.", 2, "1. Introduction")),
        ];
        assert_eq!(
            assemble_context(&chunks),
            "--- Context from Page 7, Section: 3. Results ---\nSecond best.\n\n\
             --- Context from Page 2, Section: 1. Introduction ---\nThird."
        );
    }

    #[test]
    fn citation_format() {
        assert_eq!(format_citation(19, "5.5 DISCUSSION"), "[Page 19, 5.5 DISCUSSION]");
    }
}
