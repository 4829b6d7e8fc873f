//! Direct matching of queries against document headings.
//!
//! A heading is a hit when its text, with the numbering prefix removed and
//! lower-cased, appears inside the lower-cased query. Asking about
//! "the methodology section" therefore hits `2. Methodology`.

use std::collections::{BTreeMap, HashSet};
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{EngineConfig, compile_pattern};
use crate::document::Chunk;
use crate::error::Result;

/// Matches queries against the headings of a chunk set.
#[derive(Debug, Clone)]
pub struct StructuralMatcher {
    numbering_prefix: Regex,
}

impl StructuralMatcher {
    /// Create a matcher that strips `numbering_prefix_pattern` from headings.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`](crate::RagError::ConfigError) if the
    /// pattern does not compile.
    pub fn new(numbering_prefix_pattern: &str) -> Result<Self> {
        Ok(Self {
            numbering_prefix: compile_pattern("numbering_prefix_pattern", numbering_prefix_pattern)?,
        })
    }

    /// Create a matcher from an [`EngineConfig`].
    pub fn from_config(config: &EngineConfig) -> Result<Self> {
        Self::new(&config.numbering_prefix_pattern)
    }

    /// Strip the numbering prefix and lower-case the remainder.
    ///
    /// `"1.2.3 Related Work"` becomes `"related work"`.
    pub fn normalize_heading(&self, heading: &str) -> String {
        self.numbering_prefix.replace(heading.trim(), "").trim().to_lowercase()
    }

    /// Distinct headings whose normalised form occurs in the query, in order
    /// of first appearance in `chunks`.
    ///
    /// Headings that normalise to an empty string never match.
    pub fn matching_headings<'a>(&self, query: &str, chunks: &'a [Chunk]) -> Vec<&'a str> {
        let query = query.to_lowercase();
        let mut seen = HashSet::new();
        let mut hits = Vec::new();

        for chunk in chunks {
            let heading = chunk.heading.as_str();
            if !seen.insert(heading) {
                continue;
            }
            let normalized = self.normalize_heading(heading);
            if !normalized.is_empty() && query.contains(&normalized) {
                hits.push(heading);
            }
        }

        hits
    }

    /// Every chunk under a matching heading.
    ///
    /// Results are grouped by heading in first-appearance order, then by
    /// chunk order within the heading. An empty result is the signal to
    /// fall back to semantic search.
    pub fn find(&self, query: &str, chunks: &[Chunk]) -> Vec<Chunk> {
        let headings = self.matching_headings(query, chunks);
        if headings.is_empty() {
            return Vec::new();
        }

        let matched: Vec<Chunk> = headings
            .iter()
            .flat_map(|heading| chunks.iter().filter(move |c| c.heading == *heading))
            .cloned()
            .collect();

        debug!(headings = ?headings, chunk_count = matched.len(), "structural hit");
        matched
    }
}

/// Display-oriented summary of a document's sections.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentOutline {
    /// Distinct headings sorted by length, then lexically.
    pub headings: Vec<String>,
    /// Highest page number holding a chunk.
    pub pages: usize,
    /// Total number of chunks.
    pub total_chunks: usize,
    /// Number of chunks under each heading.
    pub chunks_by_heading: BTreeMap<String, usize>,
}

impl DocumentOutline {
    /// Summarise the sections of a chunk set.
    pub fn from_chunks(chunks: &[Chunk]) -> Self {
        let mut chunks_by_heading = BTreeMap::new();
        for chunk in chunks {
            *chunks_by_heading.entry(chunk.heading.clone()).or_insert(0) += 1;
        }

        let mut headings: Vec<String> = chunks_by_heading.keys().cloned().collect();
        headings.sort_by(|a, b| a.len().cmp(&b.len()).then_with(|| a.cmp(b)));

        Self {
            headings,
            pages: chunks.iter().map(|c| c.page_number).max().unwrap_or(0),
            total_chunks: chunks.len(),
            chunks_by_heading,
        }
    }
}

/// Leading number forms tried in order: `1.2.3`, `Chapter 5`, `Section 2.1`.
static SECTION_NUMBER_PATTERNS: LazyLock<[Regex; 3]> = LazyLock::new(|| {
    [r"^(\d+(?:\.\d+)*)", r"^[Cc]hapter\s+(\d+)", r"^[Ss]ection\s+(\d+(?:\.\d+)*)"]
        .map(|pattern| Regex::new(pattern).expect("unreachable error: invalid section pattern"))
});

/// Extract the section number from a heading.
///
/// Recognises `1.2.3 Title`, `Chapter 5 Title` and `Section 2.1 Title`.
/// Only the first letter of the keyword may be either case, so
/// `CHAPTER 7` yields nothing.
pub fn extract_section_number(heading: &str) -> Option<String> {
    let heading = heading.trim();
    SECTION_NUMBER_PATTERNS
        .iter()
        .find_map(|pattern| pattern.captures(heading))
        .and_then(|captures| captures.get(1))
        .map(|number| number.as_str().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matcher() -> StructuralMatcher {
        StructuralMatcher::from_config(&EngineConfig::default()).unwrap()
    }

    fn chunks() -> Vec<Chunk> {
        vec![
            Chunk::new("intro a", 1, "1. Introduction"),
            Chunk::new("method a", 2, "2. Methodology"),
            Chunk::new("intro b", 2, "1. Introduction"),
            Chunk::new("method b", 3, "2. Methodology"),
            Chunk::new("chapter body", 4, "CHAPTER 3 Data Collection"),
        ]
    }

    #[test]
    fn normalizes_numbered_and_chapter_headings() {
        let m = matcher();
        assert_eq!(m.normalize_heading("1.2.3 Related Work"), "related work");
        assert_eq!(m.normalize_heading("2. Methodology"), "methodology");
        assert_eq!(m.normalize_heading("CHAPTER 7 Results"), "results");
        assert_eq!(m.normalize_heading("Introduction"), "introduction");
    }

    #[test]
    fn hit_returns_only_chunks_of_matching_heading() {
        let hits = matcher().find("Tell me about Methodology", &chunks());
        let texts: Vec<&str> = hits.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["method a", "method b"]);
    }

    #[test]
    fn multiple_hits_follow_first_appearance_order() {
        let hits = matcher().find("compare the methodology with the introduction", &chunks());
        let texts: Vec<&str> = hits.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["intro a", "intro b", "method a", "method b"]);
    }

    #[test]
    fn chapter_prefix_is_stripped() {
        let hits = matcher().find("how was data collection done?", &chunks());
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].heading, "CHAPTER 3 Data Collection");
    }

    #[test]
    fn miss_returns_empty() {
        assert!(matcher().find("What is the weather today?", &chunks()).is_empty());
        assert!(matcher().find("anything", &[]).is_empty());
    }

    #[test]
    fn empty_normalized_heading_never_matches() {
        let chunks = vec![Chunk::new("body", 1, "   ")];
        assert!(matcher().find("any query at all", &chunks).is_empty());
    }

    #[test]
    fn outline_sorts_headings_by_length_then_text() {
        let outline = DocumentOutline::from_chunks(&chunks());
        assert_eq!(
            outline.headings,
            vec!["2. Methodology", "1. Introduction", "CHAPTER 3 Data Collection"]
        );
        assert_eq!(outline.pages, 4);
        assert_eq!(outline.total_chunks, 5);
        assert_eq!(outline.chunks_by_heading["1. Introduction"], 2);
    }

    #[test]
    fn extracts_section_numbers() {
        assert_eq!(extract_section_number("1.2.3 Related Work").as_deref(), Some("1.2.3"));
        assert_eq!(extract_section_number("2. Methodology").as_deref(), Some("2"));
        assert_eq!(extract_section_number("Chapter 5 Results").as_deref(), Some("5"));
        assert_eq!(extract_section_number("Section 2.1 Scope").as_deref(), Some("2.1"));
        assert_eq!(extract_section_number("Introduction"), None);
    }

    #[test]
    fn section_numbers_follow_keyword_case_and_stop_at_malformed_parts() {
        assert_eq!(extract_section_number("chapter 12 Findings").as_deref(), Some("12"));
        assert_eq!(extract_section_number("CHAPTER 7 Results"), None);
        assert_eq!(extract_section_number("1..2 Foo").as_deref(), Some("1"));
        assert_eq!(extract_section_number("  section 4 Limits ").as_deref(), Some("4"));
        assert_eq!(extract_section_number("Chapter Five"), None);
    }
}
