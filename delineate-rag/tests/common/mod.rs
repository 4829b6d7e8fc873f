//! Shared deterministic collaborators for integration tests.

#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use delineate_rag::{
    EmbeddingProvider, EngineConfig, PagedText, RagEngine, RagError, RelevanceScorer, Result,
};

pub const DIM: usize = 64;

fn words(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
}

fn fnv1a(word: &str) -> u64 {
    word.bytes().fold(0xcbf2_9ce4_8422_2325, |hash, b| {
        (hash ^ u64::from(b)).wrapping_mul(0x0100_0000_01b3)
    })
}

/// Bag-of-words embedder hashing each lowercased word into one of [`DIM`] buckets.
#[derive(Default)]
pub struct HashingEmbedder {
    pub calls: AtomicUsize,
}

impl HashingEmbedder {
    pub fn vector(text: &str) -> Vec<f32> {
        let mut v = vec![0.0f32; DIM];
        for word in words(text) {
            v[(fnv1a(&word) % DIM as u64) as usize] += 1.0;
        }
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            v.iter_mut().for_each(|x| *x /= norm);
        }
        v
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EmbeddingProvider for HashingEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Self::vector(text))
    }

    fn dimensions(&self) -> usize {
        DIM
    }

    fn name(&self) -> &str {
        "hashing"
    }
}

/// Embeds documents normally but fails every single-text (query) embedding.
#[derive(Default)]
pub struct QueryFailingEmbedder;

#[async_trait]
impl EmbeddingProvider for QueryFailingEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        Err(RagError::EmbeddingFailure {
            provider: "query-failing".to_string(),
            message: "model unavailable".to_string(),
        })
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| HashingEmbedder::vector(t)).collect())
    }

    fn dimensions(&self) -> usize {
        DIM
    }
}

/// Fails every call.
pub struct BrokenEmbedder;

#[async_trait]
impl EmbeddingProvider for BrokenEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        Err(RagError::EmbeddingFailure {
            provider: "broken".to_string(),
            message: "connection refused".to_string(),
        })
    }

    fn dimensions(&self) -> usize {
        DIM
    }
}

/// Scores a passage by the number of distinct query words it contains.
#[derive(Default)]
pub struct KeywordScorer {
    pub calls: AtomicUsize,
}

impl KeywordScorer {
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RelevanceScorer for KeywordScorer {
    async fn score(&self, query: &str, passage: &str) -> Result<f32> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let passage_words: HashSet<String> = words(passage).collect();
        let overlap = words(query).collect::<HashSet<_>>().intersection(&passage_words).count();
        Ok(overlap as f32)
    }

    fn name(&self) -> &str {
        "keyword"
    }
}

pub struct BrokenScorer;

#[async_trait]
impl RelevanceScorer for BrokenScorer {
    async fn score(&self, _query: &str, _passage: &str) -> Result<f32> {
        Err(RagError::RerankingFailure {
            reranker: "broken".to_string(),
            message: "model crashed".to_string(),
        })
    }
}

pub fn engine_with(
    config: EngineConfig,
    embedder: Arc<dyn EmbeddingProvider>,
    scorer: Arc<dyn RelevanceScorer>,
) -> RagEngine {
    RagEngine::builder()
        .config(config)
        .embedding_provider(embedder)
        .scorer(scorer)
        .build()
        .expect("engine builds")
}

/// A three-section research paper spread over four pages.
pub fn research_paper() -> PagedText {
    PagedText::new([
        "1. Introduction\n\
         This study examines how irrigation schedules affect crop yield in arid regions.\n\
         Prior work focused on rainfall alone.",
        "2. Methodology\n\
         We sampled forty farms across three provinces during two growing seasons.\n\n\
         Soil moisture sensors recorded readings every hour at three depths.\n\n\
         Yield was measured by weighing the harvest from marked plots.",
        "Interviews with farmers supplemented the sensor data with planting dates.\n\n\
         Statistical analysis used mixed effects models with farm as a random effect.",
        "3. Results\n\
         Scheduled irrigation raised yield by eighteen percent on average.\n\
         Gains were largest in the driest province.",
    ])
}
