//! Vector store trait for storing and searching chunk embeddings.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::document::{IndexedDocument, QueryHit};
use crate::error::{RagError, Result};

/// Distance function of a collection, fixed when the collection is created.
///
/// Lower distances are nearer for every metric.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceMetric {
    /// `1 - cos(a, b)`. Zero-magnitude vectors have distance 1.
    #[default]
    Cosine,
    /// Squared Euclidean distance.
    L2,
    /// `1 - a·b`.
    InnerProduct,
}

impl DistanceMetric {
    /// Distance between two vectors of equal length.
    pub fn distance(&self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            DistanceMetric::Cosine => {
                let dot = dot(a, b);
                let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
                let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
                if norm_a == 0.0 || norm_b == 0.0 {
                    return 1.0;
                }
                1.0 - dot / (norm_a * norm_b)
            }
            DistanceMetric::L2 => a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum(),
            DistanceMetric::InnerProduct => 1.0 - dot(a, b),
        }
    }

    /// The name used in configuration and persisted collection metadata.
    pub fn as_str(&self) -> &'static str {
        match self {
            DistanceMetric::Cosine => "cosine",
            DistanceMetric::L2 => "l2",
            DistanceMetric::InnerProduct => "inner_product",
        }
    }
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

impl fmt::Display for DistanceMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DistanceMetric {
    type Err = RagError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "cosine" => Ok(DistanceMetric::Cosine),
            "l2" | "euclidean" => Ok(DistanceMetric::L2),
            "ip" | "inner_product" => Ok(DistanceMetric::InnerProduct),
            other => Err(RagError::Config(format!("unknown distance metric '{other}'"))),
        }
    }
}

/// Summary of a collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionInfo {
    /// Collection name.
    pub name: String,
    /// Distance metric fixed at creation.
    pub metric: DistanceMetric,
    /// Embedding length, `None` until the first document is inserted.
    pub dimensions: Option<usize>,
    /// Number of stored documents.
    pub count: usize,
}

/// A storage backend for chunk embeddings with nearest-neighbour search.
///
/// Implementations manage named collections of [`IndexedDocument`]s. Inserts
/// are keyed by document id and never overwrite: a collection holds at most
/// one document per id. Every operation on a collection that does not exist
/// fails with [`RagError::CollectionNotFound`]; an existing but empty
/// collection simply yields empty results.
///
/// # Example
///
/// ```rust,ignore
/// use complaintbot_rag::{DistanceMetric, InMemoryVectorStore, VectorStore};
///
/// let store = InMemoryVectorStore::new();
/// store.create_collection("complaints", DistanceMetric::Cosine).await?;
/// store.upsert("complaints", &documents).await?;
/// let hits = store.query("complaints", &probe, 3).await?;
/// ```
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Create a named collection. No-op if it already exists; the metric of an
    /// existing collection is never changed.
    async fn create_collection(&self, name: &str, metric: DistanceMetric) -> Result<()>;

    /// Delete a named collection and all its data.
    async fn delete_collection(&self, name: &str) -> Result<()>;

    /// Describe a collection, or `None` if it does not exist.
    async fn collection_info(&self, name: &str) -> Result<Option<CollectionInfo>>;

    /// Insert documents whose ids are not yet present.
    ///
    /// Documents with an existing id (or repeated within `documents`) are
    /// skipped. Returns the number of documents actually inserted.
    async fn upsert(&self, collection: &str, documents: &[IndexedDocument]) -> Result<usize>;

    /// Whether a document with `id` exists.
    async fn contains(&self, collection: &str, id: &str) -> Result<bool>;

    /// Snapshot of every id in the collection.
    async fn list_ids(&self, collection: &str) -> Result<HashSet<String>>;

    /// Fetch documents by id, in request order. Unknown ids are skipped.
    async fn get(&self, collection: &str, ids: &[&str]) -> Result<Vec<IndexedDocument>>;

    /// Return up to `k` documents nearest to `embedding`.
    ///
    /// Hits are ordered by ascending distance, ties broken by id.
    async fn query(&self, collection: &str, embedding: &[f32], k: usize) -> Result<Vec<QueryHit>>;

    /// Number of documents in the collection.
    async fn count(&self, collection: &str) -> Result<usize>;
}

/// Exact k-NN over `documents`, shared by the bundled stores.
pub(crate) fn nearest<'a>(
    documents: impl IntoIterator<Item = &'a IndexedDocument>,
    metric: DistanceMetric,
    embedding: &[f32],
    k: usize,
) -> Vec<QueryHit> {
    let mut scored: Vec<(f32, &IndexedDocument)> = documents
        .into_iter()
        .map(|doc| (metric.distance(&doc.embedding, embedding), doc))
        .collect();

    scored.sort_by(|a, b| a.0.total_cmp(&b.0).then_with(|| a.1.id.cmp(&b.1.id)));
    scored.truncate(k);
    scored
        .into_iter()
        .map(|(distance, doc)| QueryHit {
            id: doc.id.clone(),
            text: doc.text.clone(),
            metadata: doc.metadata.clone(),
            distance,
        })
        .collect()
}

/// Reject `k == 0` before touching a backend.
pub(crate) fn validate_k(k: usize) -> Result<()> {
    if k == 0 {
        return Err(RagError::Config("k must be greater than zero".to_string()));
    }
    Ok(())
}

/// Check that `len` matches the dimensionality recorded for a collection.
pub(crate) fn check_dimensions(
    backend: &str,
    collection: &str,
    expected: Option<usize>,
    len: usize,
) -> Result<()> {
    match expected {
        Some(dims) if dims != len => Err(RagError::store(
            backend,
            format!("collection '{collection}' holds {dims}-dimensional vectors, got {len}"),
        )),
        _ => Ok(()),
    }
}
