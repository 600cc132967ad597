//! Data types for complaint records, chunks, stored documents and query hits.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// One consumer complaint as loaded from the dataset.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ComplaintRecord {
    /// Complaint identifier, kept as text so numeric and quoted ids compare equal.
    #[serde(rename = "Complaint ID")]
    pub complaint_id: String,
    /// Financial product the complaint is about.
    #[serde(rename = "Product")]
    pub product: String,
    /// Free-text narrative written by the consumer.
    #[serde(rename = "Consumer complaint narrative")]
    pub narrative: String,
}

impl ComplaintRecord {
    /// Create a record from its three fields.
    pub fn new(
        complaint_id: impl Into<String>,
        product: impl Into<String>,
        narrative: impl Into<String>,
    ) -> Self {
        Self {
            complaint_id: complaint_id.into(),
            product: product.into(),
            narrative: narrative.into(),
        }
    }
}

/// A window of a complaint narrative.
///
/// Chunks are derived deterministically from a [`ComplaintRecord`] and never
/// change afterwards. Their identifier is `{parent_id}_{sequence_index}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// The complaint id of the parent record.
    pub parent_id: String,
    /// Position of this chunk within the parent narrative.
    pub sequence_index: usize,
    /// The chunk text.
    pub text: String,
}

impl Chunk {
    /// The stable store identifier of this chunk.
    pub fn id(&self) -> String {
        chunk_id(&self.parent_id, self.sequence_index)
    }
}

/// Build the identifier of the `sequence_index`-th chunk of `parent_id`.
pub fn chunk_id(parent_id: &str, sequence_index: usize) -> String {
    format!("{parent_id}_{sequence_index}")
}

/// Metadata stored alongside every indexed chunk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    /// Product of the parent complaint.
    pub product: String,
    /// Id of the parent complaint.
    pub complaint_id: String,
}

impl ChunkMetadata {
    /// Metadata for chunks of `record`.
    pub fn for_record(record: &ComplaintRecord) -> Self {
        Self { product: record.product.clone(), complaint_id: record.complaint_id.clone() }
    }

    /// The metadata as a plain string map.
    pub fn to_map(&self) -> HashMap<String, String> {
        HashMap::from([
            ("product".to_string(), self.product.clone()),
            ("complaint_id".to_string(), self.complaint_id.clone()),
        ])
    }
}

/// A chunk together with its embedding and metadata, as held by a store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexedDocument {
    /// Unique identifier within the collection.
    pub id: String,
    /// The chunk text.
    pub text: String,
    /// The embedding vector of `text`.
    pub embedding: Vec<f32>,
    /// Product and complaint id of the parent record.
    pub metadata: ChunkMetadata,
}

/// One nearest-neighbour hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryHit {
    /// Identifier of the matched document.
    pub id: String,
    /// Text of the matched document.
    pub text: String,
    /// Metadata of the matched document.
    pub metadata: ChunkMetadata,
    /// Distance to the probe under the collection's metric (lower is nearer).
    pub distance: f32,
}
