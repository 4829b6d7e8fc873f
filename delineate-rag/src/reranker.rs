//! Cross-encoder style reranking of candidate passages.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, instrument, warn};

use crate::document::RetrievedChunk;
use crate::error::{RagError, Result};

/// A pairwise relevance scorer, typically a cross-encoder model.
///
/// Higher scores mean more relevant. Scores only need to be comparable
/// within a single query.
///
/// The default [`score_batch`](RelevanceScorer::score_batch) calls
/// [`score`](RelevanceScorer::score) sequentially; backends that score
/// pairs in batches should override it.
#[async_trait]
pub trait RelevanceScorer: Send + Sync {
    /// Score one `(query, passage)` pair.
    async fn score(&self, query: &str, passage: &str) -> Result<f32>;

    /// Score `query` against every passage, in passage order.
    async fn score_batch(&self, query: &str, passages: &[&str]) -> Result<Vec<f32>> {
        let mut scores = Vec::with_capacity(passages.len());
        for passage in passages {
            scores.push(self.score(query, passage).await?);
        }
        Ok(scores)
    }

    /// A short name used in logs and error messages.
    fn name(&self) -> &str {
        "scorer"
    }
}

/// Reorders candidates by descending relevance to the query.
///
/// Every candidate receives a `rerank_score`; ties keep their original
/// candidate order. The output is always a permutation of the input.
///
/// # Example
///
/// ```rust,ignore
/// use delineate_rag::Reranker;
///
/// let reranker = Reranker::new(Arc::new(my_cross_encoder));
/// let ranked = reranker.rerank("what was measured?", candidates).await?;
/// ```
#[derive(Clone)]
pub struct Reranker {
    scorer: Arc<dyn RelevanceScorer>,
}

impl std::fmt::Debug for Reranker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reranker").field("scorer", &self.scorer.name()).finish()
    }
}

impl Reranker {
    /// Create a reranker backed by `scorer`.
    pub fn new(scorer: Arc<dyn RelevanceScorer>) -> Self {
        Self { scorer }
    }

    /// Score and sort candidates.
    ///
    /// Empty input returns immediately without calling the scorer.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::RerankingFailure`] if the scorer fails or returns
    /// a different number of scores than candidates.
    #[instrument(name = "rerank", skip_all, fields(candidate_count = candidates.len()))]
    pub async fn rerank(
        &self,
        query: &str,
        mut candidates: Vec<RetrievedChunk>,
    ) -> Result<Vec<RetrievedChunk>> {
        if candidates.is_empty() {
            return Ok(candidates);
        }

        let passages: Vec<&str> = candidates.iter().map(RetrievedChunk::text).collect();
        let scores = self.scorer.score_batch(query, &passages).await.map_err(|e| {
            warn!(reranker = self.scorer.name(), error = %e, "scorer failed");
            RagError::RerankingFailure {
                reranker: self.scorer.name().to_string(),
                message: e.to_string(),
            }
        })?;

        if scores.len() != candidates.len() {
            return Err(RagError::RerankingFailure {
                reranker: self.scorer.name().to_string(),
                message: format!(
                    "expected {} scores, scorer returned {}",
                    candidates.len(),
                    scores.len()
                ),
            });
        }

        for (candidate, score) in candidates.iter_mut().zip(scores) {
            candidate.rerank_score = Some(score);
        }

        // Stable: equal scores keep candidate order.
        candidates.sort_by(|a, b| score_of(b).total_cmp(&score_of(a)));

        debug!(top_score = candidates.first().map(score_of), "reranked candidates");
        Ok(candidates)
    }

    /// Rerank, falling back to the unranked candidate order on failure.
    ///
    /// Returns the candidates and whether reranking succeeded.
    pub async fn rerank_or_passthrough(
        &self,
        query: &str,
        candidates: Vec<RetrievedChunk>,
    ) -> (Vec<RetrievedChunk>, bool) {
        match self.rerank(query, candidates.clone()).await {
            Ok(ranked) => (ranked, true),
            Err(e) => {
                warn!(error = %e, "reranking failed, keeping candidate order");
                (candidates, false)
            }
        }
    }
}

/// Missing and NaN scores rank below every real score.
fn score_of(chunk: &RetrievedChunk) -> f32 {
    match chunk.rerank_score {
        Some(score) if !score.is_nan() => score,
        _ => f32::NEG_INFINITY,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::document::Chunk;

    /// Scores a passage by how many query words it contains.
    #[derive(Default)]
    struct OverlapScorer {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl RelevanceScorer for OverlapScorer {
        async fn score(&self, query: &str, passage: &str) -> Result<f32> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let passage = passage.to_lowercase();
            Ok(query.split_whitespace().filter(|w| passage.contains(&w.to_lowercase())).count()
                as f32)
        }
    }

    struct BrokenScorer;

    #[async_trait]
    impl RelevanceScorer for BrokenScorer {
        async fn score(&self, _query: &str, _passage: &str) -> Result<f32> {
            Err(RagError::ConfigError("model not loaded".to_string()))
        }

        fn name(&self) -> &str {
            "broken"
        }
    }

    /// Returns a preset score per passage text, zero otherwise.
    struct FixedScorer(Vec<(&'static str, f32)>);

    #[async_trait]
    impl RelevanceScorer for FixedScorer {
        async fn score(&self, _query: &str, passage: &str) -> Result<f32> {
            Ok(self.0.iter().find(|(text, _)| *text == passage).map_or(0.0, |(_, s)| *s))
        }
    }

    fn candidates(texts: &[&str]) -> Vec<RetrievedChunk> {
        texts.iter().map(|t| RetrievedChunk::unscored(Chunk::new(*t, 1, "h"))).collect()
    }

    #[tokio::test]
    async fn sorts_by_descending_score_with_stable_ties() {
        let reranker = Reranker::new(Arc::new(OverlapScorer::default()));
        let ranked = reranker
            .rerank("rust memory", candidates(&["tie one", "rust and memory", "tie two", "rust"]))
            .await
            .unwrap();
        let texts: Vec<&str> = ranked.iter().map(RetrievedChunk::text).collect();
        assert_eq!(texts, vec!["rust and memory", "rust", "tie one", "tie two"]);
        assert_eq!(ranked[0].rerank_score, Some(2.0));
    }

    #[tokio::test]
    async fn nan_scores_sink_to_the_bottom() {
        let scorer = FixedScorer(vec![("two", 2.0), ("nan", f32::NAN), ("four", 4.0)]);
        let ranked = Reranker::new(Arc::new(scorer))
            .rerank("q", candidates(&["two", "nan", "four"]))
            .await
            .unwrap();
        let texts: Vec<&str> = ranked.iter().map(RetrievedChunk::text).collect();
        assert_eq!(texts, vec!["four", "two", "nan"]);
        assert!(ranked[2].rerank_score.is_some_and(f32::is_nan));
    }

    #[tokio::test]
    async fn empty_input_skips_the_scorer() {
        let scorer = Arc::new(OverlapScorer::default());
        let reranker = Reranker::new(scorer.clone());
        assert!(reranker.rerank("q", Vec::new()).await.unwrap().is_empty());
        assert_eq!(scorer.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn scorer_failure_is_reported() {
        let reranker = Reranker::new(Arc::new(BrokenScorer));
        let err = reranker.rerank("q", candidates(&["a"])).await.unwrap_err();
        assert!(matches!(err, RagError::RerankingFailure { ref reranker, .. } if reranker == "broken"));
    }

    #[tokio::test]
    async fn passthrough_keeps_order_on_failure() {
        let reranker = Reranker::new(Arc::new(BrokenScorer));
        let (chunks, reranked) =
            reranker.rerank_or_passthrough("q", candidates(&["b", "a", "c"])).await;
        assert!(!reranked);
        let texts: Vec<&str> = chunks.iter().map(RetrievedChunk::text).collect();
        assert_eq!(texts, vec!["b", "a", "c"]);
        assert!(chunks.iter().all(|c| c.rerank_score.is_none()));
    }
}
