//! Embedding provider trait for turning passages and queries into vectors.

use async_trait::async_trait;

use crate::error::{RagError, Result};

/// A provider that generates fixed-dimension vector embeddings from text.
///
/// Implementations wrap a concrete model (a local sentence-transformer, a
/// hosted API, ...) behind a unified async interface. Callers construct the
/// provider once and hand it to the engine; nothing in this crate caches
/// models behind the caller's back.
///
/// The default [`embed_batch`](EmbeddingProvider::embed_batch) calls
/// [`embed`](EmbeddingProvider::embed) sequentially; backends with native
/// batching should override it.
///
/// # Example
///
/// ```rust,ignore
/// use delineate_rag::EmbeddingProvider;
///
/// let provider = MyEmbeddingProvider::new();
/// let embedding = provider.embed("hello world").await?;
/// assert_eq!(embedding.len(), provider.dimensions());
/// ```
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate an embedding vector for a single text input.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate embedding vectors for a batch of text inputs, in input order.
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.embed(text).await?);
        }
        Ok(results)
    }

    /// Return the dimensionality of embeddings produced by this provider.
    fn dimensions(&self) -> usize;

    /// A short name used in logs and error messages.
    fn name(&self) -> &str {
        "embedding"
    }
}

/// Check a batch of embeddings against the expected count and a shared dimension.
///
/// Returns the common dimension.
pub(crate) fn check_batch(
    provider: &dyn EmbeddingProvider,
    embeddings: &[Vec<f32>],
    expected_count: usize,
) -> Result<usize> {
    if embeddings.len() != expected_count {
        return Err(RagError::EmbeddingFailure {
            provider: provider.name().to_string(),
            message: format!(
                "expected {expected_count} embeddings, provider returned {}",
                embeddings.len()
            ),
        });
    }

    let dimension = embeddings.first().map(Vec::len).unwrap_or_default();
    if dimension == 0 {
        return Err(RagError::EmbeddingFailure {
            provider: provider.name().to_string(),
            message: "provider returned zero-dimensional embeddings".to_string(),
        });
    }

    if let Some(bad) = embeddings.iter().find(|e| e.len() != dimension) {
        return Err(RagError::EmbeddingFailure {
            provider: provider.name().to_string(),
            message: format!(
                "inconsistent embedding dimensions: expected {dimension}, got {}",
                bad.len()
            ),
        });
    }

    Ok(dimension)
}
