//! # delineate-rag
//!
//! Heading-aware hybrid retrieval over a single document.
//!
//! A document's pages are segmented into heading-tagged [`Block`]s, split
//! into bounded [`Chunk`]s that keep their page and heading, and indexed by
//! embedding. Queries first try a direct structural match against section
//! headings; only when none matches does the engine fall back to vector
//! search. Either way the candidates are reranked by a pairwise relevance
//! scorer and assembled into a context block with page and section
//! provenance.
//!
//! Embedding and scoring models are supplied by the caller through
//! [`EmbeddingProvider`] and [`RelevanceScorer`]; this crate ships no model.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use delineate_rag::{EngineConfig, PagedText, RagEngine};
//!
//! let engine = RagEngine::builder()
//!     .config(EngineConfig::default())
//!     .embedding_provider(Arc::new(my_embedder))
//!     .scorer(Arc::new(my_cross_encoder))
//!     .build()?;
//!
//! engine.ingest(&PagedText::new(pages)).await?;
//! let result = engine.query("What does the methodology section say?").await;
//! ```

pub mod chunking;
pub mod config;
pub mod context;
pub mod document;
pub mod embedding;
pub mod error;
pub mod index;
pub mod pipeline;
pub mod reranker;
pub mod retriever;
pub mod segmenter;
pub mod source;
pub mod stats;
pub mod structural;

pub use chunking::{Chunker, RecursiveChunker, validate_chunks};
pub use config::{EngineConfig, EngineConfigBuilder};
pub use context::{NO_CONTEXT, assemble_context, format_citation};
pub use document::{Block, Chunk, RetrievedChunk};
pub use embedding::EmbeddingProvider;
pub use error::{RagError, Result};
pub use index::{
    DocumentIndex, FlatIndex, IndexKind, IndexStats, IvfIndex, Neighbor, VectorIndex, squared_l2,
};
pub use pipeline::{IngestReport, RagEngine, RagEngineBuilder};
pub use reranker::{RelevanceScorer, Reranker};
pub use retriever::{HybridRetriever, RetrievalPlan, RetrievalResult, RetrievalStrategy};
pub use segmenter::{Segmentation, Segmenter};
pub use source::{DocumentSource, PagedText, PlainText};
pub use stats::{CorpusSummary, SearchStats};
pub use structural::{DocumentOutline, StructuralMatcher, extract_section_number};
