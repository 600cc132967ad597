//! Embedding provider trait for generating vector embeddings from text.

use std::hash::Hasher;

use async_trait::async_trait;
use twox_hash::XxHash64;

use crate::error::{RagError, Result};

/// A provider that generates vector embeddings from text input.
///
/// Implementations wrap a fixed embedding model behind a unified async
/// interface. The default [`embed_batch`](EmbeddingProvider::embed_batch)
/// implementation calls [`embed`](EmbeddingProvider::embed) sequentially;
/// backends that support native batching should override it. Outputs are in
/// input order and one per input.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Short name used in logs and errors.
    fn name(&self) -> &str;

    /// Generate an embedding vector for a single text input.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate embedding vectors for a batch of text inputs.
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.embed(text).await?);
        }
        Ok(results)
    }

    /// Return the dimensionality of embeddings produced by this provider.
    fn dimensions(&self) -> usize;
}

/// Check that a backend returned exactly one vector per input.
pub(crate) fn ensure_batch_len(
    provider: &str,
    expected: usize,
    vectors: Vec<Vec<f32>>,
) -> Result<Vec<Vec<f32>>> {
    if vectors.len() != expected {
        return Err(RagError::embedding(
            provider,
            format!("expected {expected} embeddings, got {}", vectors.len()),
        ));
    }
    Ok(vectors)
}

/// Deterministic feature-hashing embedder.
///
/// Lower-cased alphanumeric tokens are hashed with xxHash64 into
/// `dimensions` buckets with a hash-derived sign, and the result is
/// L2-normalised. Texts sharing words land close together under cosine
/// distance, which is enough for offline demos and tests without model
/// weights. Text without any token embeds to the zero vector.
#[derive(Debug, Clone)]
pub struct HashEmbeddingProvider {
    dimensions: usize,
}

impl HashEmbeddingProvider {
    /// Default number of buckets, matching `all-MiniLM-L6-v2`.
    pub const DEFAULT_DIMENSIONS: usize = 384;

    /// Create an embedder producing `dimensions`-long vectors.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Config`] if `dimensions == 0`.
    pub fn new(dimensions: usize) -> Result<Self> {
        if dimensions == 0 {
            return Err(RagError::Config("embedding dimensions must be greater than zero".into()));
        }
        Ok(Self { dimensions })
    }

    fn hash_token(token: &str) -> u64 {
        let mut hasher = XxHash64::with_seed(0);
        hasher.write(token.as_bytes());
        hasher.finish()
    }
}

impl Default for HashEmbeddingProvider {
    fn default() -> Self {
        Self { dimensions: Self::DEFAULT_DIMENSIONS }
    }
}

#[async_trait]
impl EmbeddingProvider for HashEmbeddingProvider {
    fn name(&self) -> &str {
        "hash"
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vector = vec![0.0f32; self.dimensions];
        let lowered = text.to_lowercase();
        for token in lowered.split(|c: char| !c.is_alphanumeric()).filter(|t| !t.is_empty()) {
            let hash = Self::hash_token(token);
            let bucket = (hash % self.dimensions as u64) as usize;
            let sign = if hash >> 63 == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }

        let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|x| *x /= norm);
        }
        Ok(vector)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn hash_embeddings_are_deterministic_and_normalised() {
        let provider = HashEmbeddingProvider::new(64).unwrap();
        let a = provider.embed("Overdraft fee charged twice").await.unwrap();
        let b = provider.embed("overdraft FEE charged twice!").await.unwrap();
        assert_eq!(a.len(), 64);
        assert_eq!(a, b, "case and punctuation do not change the embedding");

        let norm: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5, "norm={norm}");
    }

    #[tokio::test]
    async fn default_batch_preserves_order() {
        let provider = HashEmbeddingProvider::new(32).unwrap();
        let batch = provider.embed_batch(&["late payment", "loan"]).await.unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(batch[0], provider.embed("late payment").await.unwrap());
        assert_eq!(batch[1], provider.embed("loan").await.unwrap());
    }

    #[tokio::test]
    async fn tokenless_text_embeds_to_zero_vector() {
        let provider = HashEmbeddingProvider::new(8).unwrap();
        let v = provider.embed("  ...  ").await.unwrap();
        assert!(v.iter().all(|x| *x == 0.0));
    }

    #[test]
    fn zero_dimensions_rejected() {
        assert!(matches!(HashEmbeddingProvider::new(0), Err(RagError::Config(_))));
    }

    #[test]
    fn batch_length_mismatch_is_an_embedding_error() {
        let err = ensure_batch_len("stub", 2, vec![vec![0.0]]).unwrap_err();
        assert!(matches!(err, RagError::Embedding { .. }));
    }
}
