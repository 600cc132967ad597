//! In-memory vector store with exact nearest-neighbour search.
//!
//! This module provides [`InMemoryVectorStore`], a vector store backed by a
//! `HashMap` protected by a `tokio::sync::RwLock`. It is suitable for
//! development, testing, and the offline demo.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use crate::document::{IndexedDocument, QueryHit};
use crate::error::{RagError, Result};
use crate::vectorstore::{
    CollectionInfo, DistanceMetric, VectorStore, check_dimensions, nearest, validate_k,
};

const BACKEND: &str = "InMemory";

#[derive(Debug, Default)]
pub(crate) struct MemoryCollection {
    pub(crate) metric: DistanceMetric,
    pub(crate) dimensions: Option<usize>,
    pub(crate) documents: HashMap<String, IndexedDocument>,
}

impl MemoryCollection {
    pub(crate) fn new(metric: DistanceMetric) -> Self {
        Self { metric, dimensions: None, documents: HashMap::new() }
    }

    /// Insert the documents whose ids are absent and return them.
    ///
    /// All documents are checked against the collection dimensionality before
    /// anything is inserted.
    pub(crate) fn insert_new(
        &mut self,
        backend: &str,
        name: &str,
        documents: &[IndexedDocument],
    ) -> Result<Vec<IndexedDocument>> {
        let mut dims = self.dimensions;
        for doc in documents {
            check_dimensions(backend, name, dims, doc.embedding.len())?;
            if dims.is_none() {
                dims = Some(doc.embedding.len());
            }
        }

        let mut inserted = Vec::new();
        for doc in documents {
            if self.documents.contains_key(&doc.id) {
                continue;
            }
            self.documents.insert(doc.id.clone(), doc.clone());
            inserted.push(doc.clone());
        }
        if !inserted.is_empty() {
            self.dimensions = dims;
        }
        Ok(inserted)
    }

    pub(crate) fn info(&self, name: &str) -> CollectionInfo {
        CollectionInfo {
            name: name.to_string(),
            metric: self.metric,
            dimensions: self.dimensions,
            count: self.documents.len(),
        }
    }

    pub(crate) fn get(&self, ids: &[&str]) -> Vec<IndexedDocument> {
        ids.iter().filter_map(|id| self.documents.get(*id).cloned()).collect()
    }

    pub(crate) fn query(
        &self,
        backend: &str,
        name: &str,
        embedding: &[f32],
        k: usize,
    ) -> Result<Vec<QueryHit>> {
        if self.documents.is_empty() {
            return Ok(Vec::new());
        }
        check_dimensions(backend, name, self.dimensions, embedding.len())?;
        Ok(nearest(self.documents.values(), self.metric, embedding, k))
    }
}

/// An in-memory vector store using exact k-NN search.
///
/// Collections are stored as nested `HashMap`s: collection name → document ID → document.
/// All operations are async-safe via `tokio::sync::RwLock`.
///
/// # Example
///
/// ```rust,ignore
/// use complaintbot_rag::{DistanceMetric, InMemoryVectorStore, VectorStore};
///
/// let store = InMemoryVectorStore::new();
/// store.create_collection("complaints", DistanceMetric::Cosine).await?;
/// ```
#[derive(Debug, Default)]
pub struct InMemoryVectorStore {
    collections: RwLock<HashMap<String, MemoryCollection>>,
}

impl InMemoryVectorStore {
    /// Create a new empty in-memory vector store.
    pub fn new() -> Self {
        Self::default()
    }
}

fn not_found(collection: &str) -> RagError {
    RagError::CollectionNotFound { collection: collection.to_string() }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn create_collection(&self, name: &str, metric: DistanceMetric) -> Result<()> {
        let mut collections = self.collections.write().await;
        collections.entry(name.to_string()).or_insert_with(|| MemoryCollection::new(metric));
        Ok(())
    }

    async fn delete_collection(&self, name: &str) -> Result<()> {
        let mut collections = self.collections.write().await;
        collections.remove(name);
        Ok(())
    }

    async fn collection_info(&self, name: &str) -> Result<Option<CollectionInfo>> {
        let collections = self.collections.read().await;
        Ok(collections.get(name).map(|c| c.info(name)))
    }

    async fn upsert(&self, collection: &str, documents: &[IndexedDocument]) -> Result<usize> {
        let mut collections = self.collections.write().await;
        let store = collections.get_mut(collection).ok_or_else(|| not_found(collection))?;
        let inserted = store.insert_new(BACKEND, collection, documents)?;
        debug!(
            backend = BACKEND,
            collection,
            requested = documents.len(),
            inserted = inserted.len(),
            "upsert"
        );
        Ok(inserted.len())
    }

    async fn contains(&self, collection: &str, id: &str) -> Result<bool> {
        let collections = self.collections.read().await;
        let store = collections.get(collection).ok_or_else(|| not_found(collection))?;
        Ok(store.documents.contains_key(id))
    }

    async fn list_ids(&self, collection: &str) -> Result<HashSet<String>> {
        let collections = self.collections.read().await;
        let store = collections.get(collection).ok_or_else(|| not_found(collection))?;
        Ok(store.documents.keys().cloned().collect())
    }

    async fn get(&self, collection: &str, ids: &[&str]) -> Result<Vec<IndexedDocument>> {
        let collections = self.collections.read().await;
        let store = collections.get(collection).ok_or_else(|| not_found(collection))?;
        Ok(store.get(ids))
    }

    async fn query(&self, collection: &str, embedding: &[f32], k: usize) -> Result<Vec<QueryHit>> {
        validate_k(k)?;
        let collections = self.collections.read().await;
        let store = collections.get(collection).ok_or_else(|| not_found(collection))?;
        store.query(BACKEND, collection, embedding, k)
    }

    async fn count(&self, collection: &str) -> Result<usize> {
        let collections = self.collections.read().await;
        let store = collections.get(collection).ok_or_else(|| not_found(collection))?;
        Ok(store.documents.len())
    }
}
