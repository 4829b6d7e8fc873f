//! Configuration for segmentation, chunking, indexing, and retrieval.

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result};

/// Numbered headings such as `1.2.3 Title`, `2. Methodology`, or `CHAPTER 7 Title`.
pub const DEFAULT_HEADING_PATTERN: &str =
    r"^(CHAPTER \d+|\d{1,2}(\.\d{1,2})*\.?)\s+([A-Z][A-Za-z\s,:-]+)$";

/// The numbering prefix removed from headings before structural matching.
pub const DEFAULT_NUMBERING_PREFIX_PATTERN: &str = r"^(CHAPTER \d+|\d{1,2}(\.\d{1,2})*\.?)\s+";

/// Configuration parameters for the retrieval engine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    /// Maximum chunk size in characters.
    pub chunk_size: usize,
    /// Number of overlapping characters between consecutive chunks of a block.
    pub chunk_overlap: usize,
    /// Separators tried in priority order when splitting a block.
    /// An empty string means "split between any two characters".
    pub separators: Vec<String>,
    /// Regular expression a trimmed line must match to count as a heading.
    pub heading_pattern: String,
    /// Regular expression for the numbering prefix stripped before matching queries.
    pub numbering_prefix_pattern: String,
    /// Heading assigned to text that precedes the first detected heading.
    pub default_heading: String,
    /// Heading for the single synthetic block used when no heading is ever detected.
    pub fallback_heading: String,
    /// A document needs at least one chunk longer than this many characters.
    pub min_meaningful_chars: usize,
    /// Number of candidates fetched from the vector index on the semantic pass.
    pub semantic_top_k: usize,
    /// Number of reranked chunks kept after a structural hit.
    pub structural_top_k: usize,
    /// Number of reranked chunks kept after the semantic fallback.
    pub semantic_fallback_top_k: usize,
    /// Chunk count at which the clustered index replaces exact search.
    /// `None` always uses exact search.
    pub ivf_threshold: Option<usize>,
    /// Number of clusters trained for the clustered index.
    pub ivf_nlist: usize,
    /// Number of nearest clusters scanned per clustered search.
    pub ivf_nprobe: usize,
    /// Upper bound on k-means iterations while training the clustered index.
    pub ivf_max_iterations: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            chunk_size: 512,
            chunk_overlap: 128,
            separators: ["\n\n", "\n", ". ", "?", "!", " ", ""]
                .into_iter()
                .map(String::from)
                .collect(),
            heading_pattern: DEFAULT_HEADING_PATTERN.to_string(),
            numbering_prefix_pattern: DEFAULT_NUMBERING_PREFIX_PATTERN.to_string(),
            default_heading: "Introduction".to_string(),
            fallback_heading: "Document Content".to_string(),
            min_meaningful_chars: 10,
            semantic_top_k: 20,
            structural_top_k: 10,
            semantic_fallback_top_k: 5,
            ivf_threshold: None,
            ivf_nlist: 100,
            ivf_nprobe: 10,
            ivf_max_iterations: 25,
        }
    }
}

impl EngineConfig {
    /// Create a new builder for constructing an [`EngineConfig`].
    pub fn builder() -> EngineConfigBuilder {
        EngineConfigBuilder::default()
    }

    /// Parse a JSON configuration document. Missing fields take their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if the document is malformed or
    /// fails validation.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| RagError::ConfigError(format!("invalid configuration JSON: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Check that parameters are consistent.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if:
    /// - `chunk_size == 0` or `chunk_overlap >= chunk_size`
    /// - any top-K is zero
    /// - `ivf_nlist` or `ivf_nprobe` is zero
    /// - either regular expression fails to compile
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(RagError::ConfigError("chunk_size must be greater than zero".to_string()));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(RagError::ConfigError(format!(
                "chunk_overlap ({}) must be less than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        for (name, value) in [
            ("semantic_top_k", self.semantic_top_k),
            ("structural_top_k", self.structural_top_k),
            ("semantic_fallback_top_k", self.semantic_fallback_top_k),
            ("ivf_nlist", self.ivf_nlist),
            ("ivf_nprobe", self.ivf_nprobe),
        ] {
            if value == 0 {
                return Err(RagError::ConfigError(format!("{name} must be greater than zero")));
            }
        }
        compile_pattern("heading_pattern", &self.heading_pattern)?;
        compile_pattern("numbering_prefix_pattern", &self.numbering_prefix_pattern)?;
        Ok(())
    }
}

pub(crate) fn compile_pattern(name: &str, pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|e| RagError::ConfigError(format!("invalid {name}: {e}")))
}

/// Builder for constructing a validated [`EngineConfig`].
#[derive(Debug, Clone, Default)]
pub struct EngineConfigBuilder {
    config: EngineConfig,
}

impl EngineConfigBuilder {
    /// Set the maximum chunk size in characters.
    pub fn chunk_size(mut self, size: usize) -> Self {
        self.config.chunk_size = size;
        self
    }

    /// Set the overlap between consecutive chunks in characters.
    pub fn chunk_overlap(mut self, overlap: usize) -> Self {
        self.config.chunk_overlap = overlap;
        self
    }

    /// Replace the separator priority list.
    pub fn separators<I, S>(mut self, separators: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.separators = separators.into_iter().map(Into::into).collect();
        self
    }

    /// Set the heading detection pattern.
    pub fn heading_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.config.heading_pattern = pattern.into();
        self
    }

    /// Set the numbering prefix pattern stripped during structural matching.
    pub fn numbering_prefix_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.config.numbering_prefix_pattern = pattern.into();
        self
    }

    /// Set the heading used before the first detected heading.
    pub fn default_heading(mut self, heading: impl Into<String>) -> Self {
        self.config.default_heading = heading.into();
        self
    }

    /// Set the heading of the synthetic block used when no heading is found.
    pub fn fallback_heading(mut self, heading: impl Into<String>) -> Self {
        self.config.fallback_heading = heading.into();
        self
    }

    /// Set the minimal length a chunk needs to count as meaningful.
    pub fn min_meaningful_chars(mut self, chars: usize) -> Self {
        self.config.min_meaningful_chars = chars;
        self
    }

    /// Set the number of vector search candidates.
    pub fn semantic_top_k(mut self, k: usize) -> Self {
        self.config.semantic_top_k = k;
        self
    }

    /// Set the number of results kept after a structural hit.
    pub fn structural_top_k(mut self, k: usize) -> Self {
        self.config.structural_top_k = k;
        self
    }

    /// Set the number of results kept after the semantic fallback.
    pub fn semantic_fallback_top_k(mut self, k: usize) -> Self {
        self.config.semantic_fallback_top_k = k;
        self
    }

    /// Enable the clustered index for chunk sets of at least `threshold` chunks.
    pub fn ivf_threshold(mut self, threshold: usize) -> Self {
        self.config.ivf_threshold = Some(threshold);
        self
    }

    /// Set the number of clusters and the number probed per search.
    pub fn ivf_clusters(mut self, nlist: usize, nprobe: usize) -> Self {
        self.config.ivf_nlist = nlist;
        self.config.ivf_nprobe = nprobe;
        self
    }

    /// Cap the k-means iterations spent training the clustered index.
    pub fn ivf_max_iterations(mut self, iterations: usize) -> Self {
        self.config.ivf_max_iterations = iterations;
        self
    }

    /// Build the [`EngineConfig`], validating that parameters are consistent.
    ///
    /// # Errors
    ///
    /// See [`EngineConfig::validate`].
    pub fn build(self) -> Result<EngineConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = EngineConfig::builder().build().unwrap();
        assert_eq!(config.chunk_size, 512);
        assert_eq!(config.chunk_overlap, 128);
        assert_eq!(config.semantic_top_k, 20);
        assert_eq!(config.structural_top_k, 10);
        assert_eq!(config.semantic_fallback_top_k, 5);
        assert_eq!(config.ivf_threshold, None);
    }

    #[test]
    fn rejects_overlap_not_smaller_than_size() {
        let err = EngineConfig::builder().chunk_size(100).chunk_overlap(100).build().unwrap_err();
        assert!(matches!(err, RagError::ConfigError(_)));
    }

    #[test]
    fn rejects_zero_top_k() {
        let err = EngineConfig::builder().semantic_fallback_top_k(0).build().unwrap_err();
        assert!(err.to_string().contains("semantic_fallback_top_k"));
    }

    #[test]
    fn rejects_invalid_heading_pattern() {
        let err = EngineConfig::builder().heading_pattern("(unclosed").build().unwrap_err();
        assert!(err.to_string().contains("heading_pattern"));
    }

    #[test]
    fn builder_sets_clustered_index_options() {
        let config = EngineConfig::builder()
            .ivf_threshold(1_000)
            .ivf_clusters(64, 8)
            .ivf_max_iterations(40)
            .build()
            .unwrap();
        assert_eq!(config.ivf_threshold, Some(1_000));
        assert_eq!((config.ivf_nlist, config.ivf_nprobe), (64, 8));
        assert_eq!(config.ivf_max_iterations, 40);
    }

    #[test]
    fn loads_partial_json_with_defaults() {
        let config =
            EngineConfig::from_json(r#"{ "chunk_size": 256, "chunk_overlap": 32 }"#).unwrap();
        assert_eq!(config.chunk_size, 256);
        assert_eq!(config.chunk_overlap, 32);
        assert_eq!(config.default_heading, "Introduction");
    }

    #[test]
    fn default_pattern_accepts_numbered_and_chapter_headings() {
        let re = Regex::new(DEFAULT_HEADING_PATTERN).unwrap();
        assert!(re.is_match("1. Introduction"));
        assert!(re.is_match("2.3 Results and Discussion"));
        assert!(re.is_match("CHAPTER 7 Conclusions"));
        assert!(!re.is_match("This sentence is ordinary prose."));
        assert!(!re.is_match("2019 was a good year"));
    }
}
