//! Two-pass hybrid retrieval: structural match first, semantic search as fallback.
//!
//! A query moves through these stages:
//!
//! ```text
//! START -> STRUCTURAL_ATTEMPT -> STRUCTURAL_HIT ---------> RERANK -> DONE
//!                             \-> SEMANTIC_ATTEMPT ------/
//! ```
//!
//! A structural hit (the query names a section heading) goes straight to
//! reranking and keeps up to `structural_top_k` chunks. Otherwise the query
//! is embedded, the vector index supplies `semantic_top_k` candidates, and
//! after reranking only `semantic_fallback_top_k` survive. The vector index
//! is never consulted when the structural pass hits.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{Instrument, debug, info, info_span, warn};

use crate::config::EngineConfig;
use crate::context::{RETRIEVAL_ERROR_CONTEXT, assemble_context};
use crate::document::{Chunk, RetrievedChunk};
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::index::DocumentIndex;
use crate::reranker::{RelevanceScorer, Reranker};
use crate::stats::SearchStats;
use crate::structural::StructuralMatcher;

/// Which pass produced a retrieval result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetrievalStrategy {
    /// The query matched one or more section headings.
    Structural,
    /// No heading matched; results come from vector search.
    Semantic,
    /// Neither pass found anything.
    NoMatch,
}

impl std::fmt::Display for RetrievalStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Structural => write!(f, "structural"),
            Self::Semantic => write!(f, "semantic"),
            Self::NoMatch => write!(f, "no_match"),
        }
    }
}

/// The outcome of one query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalResult {
    /// Whether retrieval ran to completion. An empty result can still be successful.
    pub success: bool,
    /// Final chunks, best first.
    pub chunks: Vec<RetrievedChunk>,
    /// The assembled, provenance-annotated context.
    pub context: String,
    /// Aggregates over `chunks`.
    pub statistics: SearchStats,
    /// The query as received.
    pub query: String,
    /// The pass that produced `chunks`.
    pub strategy: RetrievalStrategy,
    /// Whether the final order comes from the reranker rather than the fallback order.
    pub reranked: bool,
    /// Why retrieval failed, when `success` is false.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RetrievalResult {
    fn completed(
        query: &str,
        strategy: RetrievalStrategy,
        chunks: Vec<RetrievedChunk>,
        reranked: bool,
    ) -> Self {
        Self {
            success: true,
            context: assemble_context(&chunks),
            statistics: SearchStats::from_chunks(&chunks),
            query: query.to_string(),
            strategy,
            reranked,
            chunks,
            error: None,
        }
    }

    /// A result for a query that could not run at all.
    pub fn failed(query: &str, error: &RagError) -> Self {
        Self {
            success: false,
            chunks: Vec::new(),
            context: RETRIEVAL_ERROR_CONTEXT.to_string(),
            statistics: SearchStats::default(),
            query: query.to_string(),
            strategy: RetrievalStrategy::NoMatch,
            reranked: false,
            error: Some(error.to_string()),
        }
    }
}

/// Which pass a query would take, computed without embedding or reranking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetrievalPlan {
    /// [`RetrievalStrategy::Structural`] or [`RetrievalStrategy::Semantic`].
    pub strategy: RetrievalStrategy,
    /// Headings the query matched, in document order.
    pub matched_headings: Vec<String>,
    /// Number of chunks under the matched headings.
    pub matched_chunks: usize,
}

impl std::fmt::Display for RetrievalPlan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.strategy {
            RetrievalStrategy::Structural => write!(
                f,
                "Structural search: query matches document sections directly. Found {} relevant chunks.",
                self.matched_chunks
            ),
            _ => write!(
                f,
                "Semantic search: no direct section match found. Using vector similarity search with re-ranking."
            ),
        }
    }
}

/// Stateless hybrid retriever.
///
/// Holds only its collaborators and limits; the document is supplied per
/// call, so one retriever can serve any number of concurrent queries.
#[derive(Clone)]
pub struct HybridRetriever {
    matcher: StructuralMatcher,
    embedder: Arc<dyn EmbeddingProvider>,
    reranker: Reranker,
    semantic_top_k: usize,
    structural_top_k: usize,
    semantic_fallback_top_k: usize,
}

impl std::fmt::Debug for HybridRetriever {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HybridRetriever")
            .field("embedder", &self.embedder.name())
            .field("reranker", &self.reranker)
            .field("semantic_top_k", &self.semantic_top_k)
            .field("structural_top_k", &self.structural_top_k)
            .field("semantic_fallback_top_k", &self.semantic_fallback_top_k)
            .finish()
    }
}

impl HybridRetriever {
    /// Create a retriever from the retrieval settings of `config`.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if `config` is invalid.
    pub fn new(
        config: &EngineConfig,
        embedder: Arc<dyn EmbeddingProvider>,
        scorer: Arc<dyn RelevanceScorer>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            matcher: StructuralMatcher::from_config(config)?,
            embedder,
            reranker: Reranker::new(scorer),
            semantic_top_k: config.semantic_top_k,
            structural_top_k: config.structural_top_k,
            semantic_fallback_top_k: config.semantic_fallback_top_k,
        })
    }

    /// The structural matcher used for the first pass.
    pub fn matcher(&self) -> &StructuralMatcher {
        &self.matcher
    }

    /// Run both passes against `index` and assemble the result.
    ///
    /// Embedding failures end the semantic pass with zero chunks and
    /// reranking failures keep the pre-rerank order; neither marks the
    /// result as failed.
    pub async fn retrieve(&self, query: &str, index: &DocumentIndex) -> RetrievalResult {
        let (strategy, chunks, reranked) = self.retrieve_chunks(query, index).await;
        info!(%strategy, chunk_count = chunks.len(), reranked, "retrieval completed");
        RetrievalResult::completed(query, strategy, chunks, reranked)
    }

    async fn retrieve_chunks(
        &self,
        query: &str,
        index: &DocumentIndex,
    ) -> (RetrievalStrategy, Vec<RetrievedChunk>, bool) {
        let structural = {
            let _span = info_span!("structural_search").entered();
            self.matcher.find(query, index.chunks())
        };

        if !structural.is_empty() {
            let candidates = structural.into_iter().map(RetrievedChunk::unscored).collect();
            let (mut ranked, reranked) =
                self.reranker.rerank_or_passthrough(query, candidates).await;
            ranked.truncate(self.structural_top_k);
            return (RetrievalStrategy::Structural, ranked, reranked);
        }

        debug!("no direct section match, performing semantic search");
        let candidates = match self
            .semantic_candidates(query, index)
            .instrument(info_span!("semantic_search", top_k = self.semantic_top_k))
            .await
        {
            Ok(candidates) => candidates,
            Err(e) => {
                warn!(error = %e, "semantic search failed, returning no chunks");
                Vec::new()
            }
        };

        if candidates.is_empty() {
            return (RetrievalStrategy::NoMatch, Vec::new(), false);
        }

        let (mut ranked, reranked) = self.reranker.rerank_or_passthrough(query, candidates).await;
        ranked.truncate(self.semantic_fallback_top_k);
        (RetrievalStrategy::Semantic, ranked, reranked)
    }

    async fn semantic_candidates(
        &self,
        query: &str,
        index: &DocumentIndex,
    ) -> Result<Vec<RetrievedChunk>> {
        if index.is_empty() {
            return Ok(Vec::new());
        }
        let query_vector = self.embedder.embed(query).await.map_err(|e| match e {
            RagError::EmbeddingFailure { .. } => e,
            other => RagError::EmbeddingFailure {
                provider: self.embedder.name().to_string(),
                message: other.to_string(),
            },
        })?;
        index.search(&query_vector, self.semantic_top_k)
    }

    /// Report which pass `query` would take over `chunks`.
    pub fn explain(&self, query: &str, chunks: &[Chunk]) -> RetrievalPlan {
        let headings = self.matcher.matching_headings(query, chunks);
        if headings.is_empty() {
            return RetrievalPlan {
                strategy: RetrievalStrategy::Semantic,
                matched_headings: Vec::new(),
                matched_chunks: 0,
            };
        }
        let matched_chunks =
            chunks.iter().filter(|c| headings.contains(&c.heading.as_str())).count();
        RetrievalPlan {
            strategy: RetrievalStrategy::Structural,
            matched_headings: headings.into_iter().map(str::to_string).collect(),
            matched_chunks,
        }
    }
}
