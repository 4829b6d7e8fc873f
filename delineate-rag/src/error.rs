//! Error types for the `delineate-rag` crate.

use thiserror::Error;

/// Errors that can occur while ingesting a document or answering a query.
#[derive(Debug, Error)]
pub enum RagError {
    /// The document produced no extractable text at all.
    #[error("Document is empty or unreadable: no extractable text found")]
    EmptyOrUnreadableDocument,

    /// Text was extracted but no chunk carries enough content to be useful.
    #[error("Insufficient content ({chunk_count} chunks): {message}")]
    InsufficientContent {
        /// Number of chunks produced before validation rejected them.
        chunk_count: usize,
        /// A description of why the content was rejected.
        message: String,
    },

    /// The embedding collaborator failed or returned malformed output.
    #[error("Embedding error ({provider}): {message}")]
    EmbeddingFailure {
        /// The embedding provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// An index build was attempted over zero chunks.
    #[error("Cannot build an index over an empty chunk set")]
    EmptyChunkSet,

    /// The relevance scorer failed during reranking.
    #[error("Reranker error ({reranker}): {message}")]
    RerankingFailure {
        /// The scorer that produced the error.
        reranker: String,
        /// A description of the failure.
        message: String,
    },

    /// A vector did not match the dimensionality of the index.
    #[error("Dimension mismatch: index has {expected} dimensions, got {actual}")]
    DimensionMismatch {
        /// Dimensionality of the index.
        expected: usize,
        /// Dimensionality of the offending vector.
        actual: usize,
    },

    /// A query was issued before any document index was published.
    #[error("No document has been indexed")]
    NoDocumentIndexed,

    /// A configuration validation error.
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl RagError {
    /// Whether this error is terminal for a document ingestion.
    pub fn is_ingestion_failure(&self) -> bool {
        matches!(
            self,
            Self::EmptyOrUnreadableDocument
                | Self::InsufficientContent { .. }
                | Self::EmptyChunkSet
                | Self::EmbeddingFailure { .. }
                | Self::DimensionMismatch { .. }
        )
    }
}

/// A convenience result type for retrieval operations.
pub type Result<T> = std::result::Result<T, RagError>;
