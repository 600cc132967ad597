//! A handle binding a vector store, an embedder and a collection name.

use std::collections::HashSet;
use std::sync::Arc;

use crate::document::{ChunkMetadata, IndexedDocument, QueryHit};
use crate::embedding::EmbeddingProvider;
use crate::error::Result;
use crate::vectorstore::VectorStore;

/// One named collection of a [`VectorStore`], plus the embedder used to turn
/// query text into vectors.
///
/// This is the adapter surface the indexing and answering code is written
/// against: documents come in with precomputed vectors and queries go out
/// either as vectors or as text.
#[derive(Clone)]
pub struct Collection {
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn EmbeddingProvider>,
    name: String,
}

impl Collection {
    /// Bind `name` in `store`. The collection must already exist for reads
    /// and writes to succeed.
    pub fn new(
        store: Arc<dyn VectorStore>,
        embedder: Arc<dyn EmbeddingProvider>,
        name: impl Into<String>,
    ) -> Self {
        Self { store, embedder, name: name.into() }
    }

    /// The collection name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The underlying store.
    pub fn store(&self) -> &Arc<dyn VectorStore> {
        &self.store
    }

    /// The embedder used for text queries.
    pub fn embedder(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.embedder
    }

    /// Insert one document unless its id is already present.
    ///
    /// Returns `true` if the document was inserted.
    pub async fn upsert(
        &self,
        id: impl Into<String>,
        text: impl Into<String>,
        embedding: Vec<f32>,
        metadata: ChunkMetadata,
    ) -> Result<bool> {
        let document = IndexedDocument { id: id.into(), text: text.into(), embedding, metadata };
        Ok(self.store.upsert(&self.name, std::slice::from_ref(&document)).await? == 1)
    }

    /// Insert a batch of documents, skipping ids already present.
    pub async fn upsert_documents(&self, documents: &[IndexedDocument]) -> Result<usize> {
        self.store.upsert(&self.name, documents).await
    }

    /// Whether a document with `id` exists.
    pub async fn exists(&self, id: &str) -> Result<bool> {
        self.store.contains(&self.name, id).await
    }

    /// Snapshot of every stored id.
    pub async fn list_ids(&self) -> Result<HashSet<String>> {
        self.store.list_ids(&self.name).await
    }

    /// Fetch documents by id.
    pub async fn get(&self, ids: &[&str]) -> Result<Vec<IndexedDocument>> {
        self.store.get(&self.name, ids).await
    }

    /// Up to `k` documents nearest to `embedding`, nearest first.
    pub async fn query(&self, embedding: &[f32], k: usize) -> Result<Vec<QueryHit>> {
        self.store.query(&self.name, embedding, k).await
    }

    /// Embed `text` and return up to `k` nearest documents.
    pub async fn query_by_text(&self, text: &str, k: usize) -> Result<Vec<QueryHit>> {
        let embedding = self.embedder.embed(text).await?;
        self.query(&embedding, k).await
    }

    /// Number of stored documents.
    pub async fn count(&self) -> Result<usize> {
        self.store.count(&self.name).await
    }
}

impl std::fmt::Debug for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collection")
            .field("name", &self.name)
            .field("embedder", &self.embedder.name())
            .finish_non_exhaustive()
    }
}
