//! Engine facade tying ingestion and retrieval together.
//!
//! The [`RagEngine`] coordinates the ingest workflow (segment → chunk →
//! validate → embed → index) and query execution against the most recently
//! published document.
//!
//! # Example
//!
//! ```rust,ignore
//! use delineate_rag::{EngineConfig, PlainText, RagEngine};
//!
//! let engine = RagEngine::builder()
//!     .config(EngineConfig::default())
//!     .embedding_provider(Arc::new(my_embedder))
//!     .scorer(Arc::new(my_cross_encoder))
//!     .build()?;
//!
//! engine.ingest(&PlainText::new(extracted_text)).await?;
//! let result = engine.query("Summarise the methodology").await;
//! println!("{}", result.context);
//! ```

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{error, info, instrument};

use crate::chunking::{Chunker, RecursiveChunker, validate_chunks};
use crate::config::EngineConfig;
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::index::{DocumentIndex, IndexStats};
use crate::reranker::RelevanceScorer;
use crate::retriever::{HybridRetriever, RetrievalPlan, RetrievalResult};
use crate::segmenter::Segmenter;
use crate::source::DocumentSource;
use crate::stats::CorpusSummary;
use crate::structural::DocumentOutline;

/// Summary of a successful ingestion.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IngestReport {
    /// Pages supplied by the source.
    pub total_pages: usize,
    /// Blocks produced by segmentation.
    pub block_count: usize,
    /// Chunks indexed.
    pub chunk_count: usize,
    /// Shape of the published index.
    pub index: IndexStats,
    /// Word counts over the indexed chunks.
    pub summary: CorpusSummary,
}

/// The retrieval engine.
///
/// Holds at most one published [`DocumentIndex`]. Ingestion builds a new
/// index completely before swapping it in, so queries only ever see a fully
/// built index, and queries already running keep the snapshot they started
/// with. Construct one via [`RagEngine::builder()`].
pub struct RagEngine {
    config: EngineConfig,
    segmenter: Segmenter,
    chunker: Arc<dyn Chunker>,
    embedding_provider: Arc<dyn EmbeddingProvider>,
    retriever: HybridRetriever,
    current: RwLock<Option<Arc<DocumentIndex>>>,
}

impl RagEngine {
    /// Create a new [`RagEngineBuilder`].
    pub fn builder() -> RagEngineBuilder {
        RagEngineBuilder::default()
    }

    /// Return a reference to the engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Return a reference to the retriever.
    pub fn retriever(&self) -> &HybridRetriever {
        &self.retriever
    }

    /// Ingest a document and publish its index, replacing any previous one.
    ///
    /// # Errors
    ///
    /// - [`RagError::EmptyOrUnreadableDocument`] if the source holds no text
    /// - [`RagError::InsufficientContent`] if no meaningful chunk results
    /// - [`RagError::EmbeddingFailure`] if embedding the chunks fails
    ///
    /// On error the previously published index, if any, stays in place.
    #[instrument(name = "ingest", skip_all)]
    pub async fn ingest(&self, source: &dyn DocumentSource) -> Result<IngestReport> {
        let pages = source.pages()?;
        let segmentation = self.segmenter.segment(&pages).map_err(|e| {
            error!(error = %e, "segmentation failed");
            e
        })?;

        let chunks = self.chunker.chunk(&segmentation.blocks);
        validate_chunks(&chunks, self.config.min_meaningful_chars).map_err(|e| {
            error!(error = %e, "document rejected");
            e
        })?;

        let summary = CorpusSummary::from_chunks(&chunks);
        let index =
            DocumentIndex::build(chunks, self.embedding_provider.as_ref(), &self.config).await?;

        let report = IngestReport {
            total_pages: segmentation.total_pages,
            block_count: segmentation.blocks.len(),
            chunk_count: index.len(),
            index: index.stats(),
            summary,
        };

        *self.current.write().await = Some(Arc::new(index));
        info!(
            total_pages = report.total_pages,
            block_count = report.block_count,
            chunk_count = report.chunk_count,
            "published document index"
        );
        Ok(report)
    }

    /// Answer a query against the published document.
    ///
    /// Without a published document the result has `success == false`.
    pub async fn query(&self, query: &str) -> RetrievalResult {
        match self.snapshot().await {
            Some(index) => self.retriever.retrieve(query, &index).await,
            None => {
                let e = RagError::NoDocumentIndexed;
                error!(error = %e, "query issued before ingestion");
                RetrievalResult::failed(query, &e)
            }
        }
    }

    /// Report which retrieval pass `query` would take.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::NoDocumentIndexed`] if no document is published.
    pub async fn explain(&self, query: &str) -> Result<RetrievalPlan> {
        let index = self.snapshot().await.ok_or(RagError::NoDocumentIndexed)?;
        Ok(self.retriever.explain(query, index.chunks()))
    }

    /// The currently published index, if any.
    pub async fn snapshot(&self) -> Option<Arc<DocumentIndex>> {
        self.current.read().await.clone()
    }

    /// Whether a document index is published.
    pub async fn is_ready(&self) -> bool {
        self.current.read().await.is_some()
    }

    /// Shape of the published index.
    pub async fn stats(&self) -> Option<IndexStats> {
        self.snapshot().await.map(|index| index.stats())
    }

    /// Section outline of the published document.
    pub async fn outline(&self) -> Option<DocumentOutline> {
        self.snapshot().await.map(|index| DocumentOutline::from_chunks(index.chunks()))
    }

    /// Drop the published index.
    pub async fn reset(&self) {
        *self.current.write().await = None;
        info!("document index reset");
    }
}

/// Builder for constructing a [`RagEngine`].
///
/// `config`, `embedding_provider` and `scorer` are required. The chunker
/// defaults to a [`RecursiveChunker`] configured from `config`.
#[derive(Default)]
pub struct RagEngineBuilder {
    config: Option<EngineConfig>,
    embedding_provider: Option<Arc<dyn EmbeddingProvider>>,
    scorer: Option<Arc<dyn RelevanceScorer>>,
    chunker: Option<Arc<dyn Chunker>>,
}

impl RagEngineBuilder {
    /// Set the engine configuration.
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the embedding provider.
    pub fn embedding_provider(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedding_provider = Some(provider);
        self
    }

    /// Set the relevance scorer used for reranking.
    pub fn scorer(mut self, scorer: Arc<dyn RelevanceScorer>) -> Self {
        self.scorer = Some(scorer);
        self
    }

    /// Override the chunking strategy.
    pub fn chunker(mut self, chunker: Arc<dyn Chunker>) -> Self {
        self.chunker = Some(chunker);
        self
    }

    /// Build the [`RagEngine`], validating that all required fields are set.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if a required field is missing or
    /// the configuration is invalid.
    pub fn build(self) -> Result<RagEngine> {
        let config =
            self.config.ok_or_else(|| RagError::ConfigError("config is required".to_string()))?;
        config.validate()?;
        let embedding_provider = self
            .embedding_provider
            .ok_or_else(|| RagError::ConfigError("embedding_provider is required".to_string()))?;
        let scorer =
            self.scorer.ok_or_else(|| RagError::ConfigError("scorer is required".to_string()))?;
        let chunker = self
            .chunker
            .unwrap_or_else(|| Arc::new(RecursiveChunker::from_config(&config)) as Arc<dyn Chunker>);

        Ok(RagEngine {
            segmenter: Segmenter::from_config(&config)?,
            retriever: HybridRetriever::new(&config, embedding_provider.clone(), scorer)?,
            chunker,
            embedding_provider,
            current: RwLock::new(None),
            config,
        })
    }
}
