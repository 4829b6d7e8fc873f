//! Heading-aware segmentation of page text into [`Block`]s.
//!
//! The [`Segmenter`] walks the pages line by line, keeping track of the most
//! recent heading. Every run of body text is emitted as a block tagged with
//! the heading in effect and the page it was read from. A block never spans
//! a page boundary, so a section that continues over several pages yields
//! one block per page.

use regex::Regex;
use tracing::{debug, warn};

use crate::config::{EngineConfig, compile_pattern};
use crate::document::Block;
use crate::error::{RagError, Result};

/// The blocks of one document plus the number of pages read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segmentation {
    /// Blocks in document order.
    pub blocks: Vec<Block>,
    /// Number of pages supplied by the source, including blank ones.
    pub total_pages: usize,
}

/// Splits page text into heading-tagged blocks.
///
/// # Example
///
/// ```rust,ignore
/// use delineate_rag::Segmenter;
///
/// let segmenter = Segmenter::from_config(&EngineConfig::default())?;
/// let segmentation = segmenter.segment(&pages)?;
/// ```
#[derive(Debug, Clone)]
pub struct Segmenter {
    heading_pattern: Regex,
    default_heading: String,
    fallback_heading: String,
}

impl Segmenter {
    /// Create a segmenter.
    ///
    /// # Arguments
    ///
    /// * `heading_pattern` — regular expression a trimmed line must match to be a heading
    /// * `default_heading` — heading for text before the first detected heading
    /// * `fallback_heading` — heading for the single block emitted when no heading matches
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if the pattern does not compile.
    pub fn new(
        heading_pattern: &str,
        default_heading: impl Into<String>,
        fallback_heading: impl Into<String>,
    ) -> Result<Self> {
        Ok(Self {
            heading_pattern: compile_pattern("heading_pattern", heading_pattern)?,
            default_heading: default_heading.into(),
            fallback_heading: fallback_heading.into(),
        })
    }

    /// Create a segmenter from the heading settings of an [`EngineConfig`].
    pub fn from_config(config: &EngineConfig) -> Result<Self> {
        Self::new(&config.heading_pattern, &config.default_heading, &config.fallback_heading)
    }

    /// Whether a trimmed line is recognised as a heading.
    pub fn is_heading(&self, line: &str) -> bool {
        self.heading_pattern.is_match(line)
    }

    /// Segment a document given as page-ordered text.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::EmptyOrUnreadableDocument`] if no page holds any
    /// non-whitespace text.
    pub fn segment<S: AsRef<str>>(&self, pages: &[S]) -> Result<Segmentation> {
        let total_pages = pages.len();
        if pages.iter().all(|page| page.as_ref().trim().is_empty()) {
            return Err(RagError::EmptyOrUnreadableDocument);
        }

        let mut blocks = Vec::new();
        let mut current_heading = self.default_heading.clone();
        let mut heading_seen = false;

        for (index, page) in pages.iter().enumerate() {
            let page_number = index + 1;
            let mut buffer = String::new();

            for line in page.as_ref().lines() {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }

                if self.is_heading(trimmed) {
                    flush(&mut blocks, &mut buffer, page_number, &current_heading);
                    current_heading = trimmed.to_string();
                    heading_seen = true;
                } else {
                    buffer.push_str(line.trim_end());
                    buffer.push('\n');
                }
            }

            flush(&mut blocks, &mut buffer, page_number, &current_heading);
        }

        if !heading_seen {
            warn!(total_pages, "no headings detected, using a single document block");
            let content = pages
                .iter()
                .map(|page| page.as_ref().trim())
                .filter(|page| !page.is_empty())
                .collect::<Vec<_>>()
                .join("\n");
            blocks = vec![Block {
                page_number: 1,
                heading: self.fallback_heading.clone(),
                content,
            }];
        }

        debug!(total_pages, block_count = blocks.len(), "segmented document");
        Ok(Segmentation { blocks, total_pages })
    }
}

fn flush(blocks: &mut Vec<Block>, buffer: &mut String, page_number: usize, heading: &str) {
    let content = buffer.trim();
    if !content.is_empty() {
        blocks.push(Block {
            page_number,
            heading: heading.to_string(),
            content: content.to_string(),
        });
    }
    buffer.clear();
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segmenter() -> Segmenter {
        Segmenter::from_config(&EngineConfig::default()).unwrap()
    }

    #[test]
    fn tags_blocks_with_the_heading_in_effect() {
        let pages = [
            "Preamble text before any heading.\n1. Introduction\nIntro body line.\n",
            "more intro on page two\n2. Methodology\nWe measured things.\n",
        ];
        let seg = segmenter().segment(&pages).unwrap();
        assert_eq!(seg.total_pages, 2);
        let summary: Vec<(usize, &str, &str)> = seg
            .blocks
            .iter()
            .map(|b| (b.page_number, b.heading.as_str(), b.content.as_str()))
            .collect();
        assert_eq!(
            summary,
            vec![
                (1, "Introduction", "Preamble text before any heading."),
                (1, "1. Introduction", "Intro body line."),
                (2, "1. Introduction", "more intro on page two"),
                (2, "2. Methodology", "We measured things."),
            ]
        );
    }

    #[test]
    fn heading_without_body_emits_nothing() {
        let pages = ["1. Introduction\n2. Methodology\nBody."];
        let seg = segmenter().segment(&pages).unwrap();
        assert_eq!(seg.blocks.len(), 1);
        assert_eq!(seg.blocks[0].heading, "2. Methodology");
    }

    #[test]
    fn empty_document_is_rejected() {
        let pages: [&str; 2] = ["   \n", ""];
        let err = segmenter().segment(&pages).unwrap_err();
        assert!(matches!(err, RagError::EmptyOrUnreadableDocument));

        let none: [&str; 0] = [];
        assert!(matches!(
            segmenter().segment(&none).unwrap_err(),
            RagError::EmptyOrUnreadableDocument
        ));
    }

    #[test]
    fn no_headings_yields_single_fallback_block() {
        let pages = ["plain prose on page one", "", "and page three"];
        let seg = segmenter().segment(&pages).unwrap();
        assert_eq!(seg.total_pages, 3);
        assert_eq!(seg.blocks.len(), 1);
        assert_eq!(seg.blocks[0].heading, "Document Content");
        assert_eq!(seg.blocks[0].page_number, 1);
        assert_eq!(seg.blocks[0].content, "plain prose on page one\nand page three");
    }

    #[test]
    fn custom_markdown_heading_pattern() {
        let segmenter = Segmenter::new(r"^#{1,6}\s+\S", "Preface", "Document").unwrap();
        let seg = segmenter.segment(&["# Setup\ninstall it\n## Usage\nrun it"]).unwrap();
        let headings: Vec<&str> = seg.blocks.iter().map(|b| b.heading.as_str()).collect();
        assert_eq!(headings, vec!["# Setup", "## Usage"]);
    }
}
