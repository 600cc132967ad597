//! RAG pipeline orchestrator.
//!
//! The [`RagPipeline`] ties together an [`EmbeddingProvider`], a
//! [`VectorStore`], a [`Chunker`] and a [`Generator`] around one configured
//! collection. It indexes complaint records (chunk → dedup → embed → store)
//! and answers questions (embed → k-NN → prompt → generate).
//!
//! # Example
//!
//! ```rust,ignore
//! use complaintbot_rag::{
//!     HashEmbeddingProvider, InMemoryVectorStore, MockGenerator, RagConfig, RagPipeline,
//! };
//!
//! let pipeline = RagPipeline::builder()
//!     .config(RagConfig::default())
//!     .embedding_provider(Arc::new(HashEmbeddingProvider::default()))
//!     .vector_store(Arc::new(InMemoryVectorStore::new()))
//!     .generator(Arc::new(MockGenerator::echo()))
//!     .build()?;
//!
//! pipeline.create_collection().await?;
//! pipeline.index_records(&records).await?;
//! let answer = pipeline.answer("Why are people unhappy with BNPL?").await?;
//! ```

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::chunking::Chunker;
use crate::collection::Collection;
use crate::config::RagConfig;
use crate::document::{ComplaintRecord, QueryHit};
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::generation::Generator;
use crate::indexing::{IndexReport, Indexer};
use crate::prompt::PromptTemplate;
use crate::vectorstore::{CollectionInfo, VectorStore};

/// A generated answer together with the chunks it was grounded on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    /// Generator output, trimmed.
    pub answer: String,
    /// Retrieved chunk texts, nearest first.
    pub sources: Vec<String>,
    /// The full retrieval hits behind `sources`.
    pub hits: Vec<QueryHit>,
}

/// The RAG pipeline orchestrator.
///
/// Construct one via [`RagPipeline::builder()`]. All operations run
/// sequentially; each awaited step completes before the next starts.
pub struct RagPipeline {
    config: RagConfig,
    embedding_provider: Arc<dyn EmbeddingProvider>,
    vector_store: Arc<dyn VectorStore>,
    chunker: Arc<dyn Chunker>,
    generator: Arc<dyn Generator>,
    prompt: PromptTemplate,
}

impl RagPipeline {
    /// Create a new [`RagPipelineBuilder`].
    pub fn builder() -> RagPipelineBuilder {
        RagPipelineBuilder::default()
    }

    /// Return a reference to the pipeline configuration.
    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    /// Return a reference to the embedding provider.
    pub fn embedding_provider(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.embedding_provider
    }

    /// Return a reference to the vector store.
    pub fn vector_store(&self) -> &Arc<dyn VectorStore> {
        &self.vector_store
    }

    /// Return a reference to the generator.
    pub fn generator(&self) -> &Arc<dyn Generator> {
        &self.generator
    }

    /// Return the prompt template.
    pub fn prompt(&self) -> &PromptTemplate {
        &self.prompt
    }

    /// Handle on the configured collection.
    pub fn collection(&self) -> Collection {
        Collection::new(
            self.vector_store.clone(),
            self.embedding_provider.clone(),
            self.config.collection_name.clone(),
        )
    }

    /// Create the configured collection with the configured metric. No-op if
    /// it already exists.
    ///
    /// # Errors
    ///
    /// Returns the vector store error if the operation fails.
    pub async fn create_collection(&self) -> Result<()> {
        let name = &self.config.collection_name;
        self.vector_store.create_collection(name, self.config.distance).await.map_err(|e| {
            error!(collection = %name, error = %e, "failed to create collection");
            e
        })
    }

    /// Delete the configured collection and everything in it.
    pub async fn delete_collection(&self) -> Result<()> {
        let name = &self.config.collection_name;
        self.vector_store.delete_collection(name).await.map_err(|e| {
            error!(collection = %name, error = %e, "failed to delete collection");
            e
        })
    }

    /// Describe the configured collection, or `None` if it does not exist.
    pub async fn collection_info(&self) -> Result<Option<CollectionInfo>> {
        let info = self.vector_store.collection_info(&self.config.collection_name).await?;
        match &info {
            Some(info) if info.count == 0 => {
                warn!(
                    collection = %info.name,
                    "collection is empty; retrieval will find no documents"
                )
            }
            Some(info) => debug!(collection = %info.name, count = info.count, "collection loaded"),
            None => {}
        }
        Ok(info)
    }

    /// An [`Indexer`] writing into the configured collection.
    pub fn indexer(&self) -> Result<Indexer> {
        Ok(Indexer::new(self.chunker.clone(), self.collection(), self.config.embed_batch_size)?
            .with_cleaning(self.config.cleaning_options()))
    }

    /// Chunk, embed and store `records`, skipping chunks already indexed.
    ///
    /// # Errors
    ///
    /// See [`Indexer::index_records`].
    pub async fn index_records(&self, records: &[ComplaintRecord]) -> Result<IndexReport> {
        self.indexer()?.index_records(records).await
    }

    /// Load, clean and index the CSV at `path`.
    ///
    /// # Errors
    ///
    /// See [`Indexer::index_csv`].
    pub async fn index_csv(&self, path: impl AsRef<Path>) -> Result<IndexReport> {
        self.indexer()?.index_csv(path).await
    }

    /// Embed `question` and return up to `k` nearest chunks.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Config`] if `k == 0`, the embedding error if the
    /// question cannot be embedded, and any store error.
    pub async fn retrieve(&self, question: &str, k: usize) -> Result<Vec<QueryHit>> {
        if k == 0 {
            return Err(RagError::Config("k must be greater than zero".to_string()));
        }

        let embedding = self.embedding_provider.embed(question).await.map_err(|e| {
            error!(error = %e, "embedding failed during retrieval");
            e
        })?;

        let hits = self.collection().query(&embedding, k).await.map_err(|e| {
            error!(
                collection = %self.config.collection_name,
                error = %e,
                "vector store query failed"
            );
            e
        })?;
        debug!(k, hits = hits.len(), "retrieval completed");
        Ok(hits)
    }

    /// Answer `question` from the configured `top_k` nearest chunks.
    pub async fn answer(&self, question: &str) -> Result<Answer> {
        self.answer_with_k(question, self.config.top_k).await
    }

    /// Answer `question` from the `k` nearest chunks.
    ///
    /// An empty collection is not an error: the generator still runs, with
    /// an empty context block, and is expected to refuse.
    ///
    /// # Errors
    ///
    /// Retrieval errors are returned as-is. If generation fails after
    /// retrieval succeeded, returns [`RagError::GenerationFailed`] carrying
    /// the retrieved sources.
    pub async fn answer_with_k(&self, question: &str, k: usize) -> Result<Answer> {
        let hits = self.retrieve(question, k).await?;
        let sources: Vec<String> = hits.iter().map(|hit| hit.text.clone()).collect();
        let prompt = self.prompt.render(question, &sources);

        match self.generator.generate(&prompt).await {
            Ok(text) => {
                info!(
                    sources = sources.len(),
                    generator = self.generator.name(),
                    "answer generated"
                );
                Ok(Answer { answer: text.trim().to_string(), sources, hits })
            }
            Err(e) => {
                error!(generator = self.generator.name(), error = %e, "generation failed");
                Err(RagError::GenerationFailed { sources, source: Box::new(e) })
            }
        }
    }
}

/// Builder for constructing a [`RagPipeline`].
///
/// `config`, `embedding_provider`, `vector_store` and `generator` are
/// required. Without an explicit chunker, one is built from the config's
/// chunking strategy and window; without a prompt, the default template is
/// used. Call [`build()`](RagPipelineBuilder::build) to validate and produce
/// the pipeline.
#[derive(Default)]
pub struct RagPipelineBuilder {
    config: Option<RagConfig>,
    embedding_provider: Option<Arc<dyn EmbeddingProvider>>,
    vector_store: Option<Arc<dyn VectorStore>>,
    chunker: Option<Arc<dyn Chunker>>,
    generator: Option<Arc<dyn Generator>>,
    prompt: Option<PromptTemplate>,
}

impl RagPipelineBuilder {
    /// Set the pipeline configuration.
    pub fn config(mut self, config: RagConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the embedding provider.
    pub fn embedding_provider(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedding_provider = Some(provider);
        self
    }

    /// Set the vector store backend.
    pub fn vector_store(mut self, store: Arc<dyn VectorStore>) -> Self {
        self.vector_store = Some(store);
        self
    }

    /// Override the chunker built from the configuration.
    pub fn chunker(mut self, chunker: Arc<dyn Chunker>) -> Self {
        self.chunker = Some(chunker);
        self
    }

    /// Set the generator.
    pub fn generator(mut self, generator: Arc<dyn Generator>) -> Self {
        self.generator = Some(generator);
        self
    }

    /// Override the prompt template.
    pub fn prompt(mut self, prompt: PromptTemplate) -> Self {
        self.prompt = Some(prompt);
        self
    }

    /// Build the [`RagPipeline`], validating the configuration and that all
    /// required fields are set.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Config`] if any required field is missing or the
    /// configuration is invalid.
    pub fn build(self) -> Result<RagPipeline> {
        let config =
            self.config.ok_or_else(|| RagError::Config("config is required".to_string()))?;
        config.validate()?;
        let embedding_provider = self
            .embedding_provider
            .ok_or_else(|| RagError::Config("embedding_provider is required".to_string()))?;
        let vector_store = self
            .vector_store
            .ok_or_else(|| RagError::Config("vector_store is required".to_string()))?;
        let generator =
            self.generator.ok_or_else(|| RagError::Config("generator is required".to_string()))?;
        let chunker = match self.chunker {
            Some(chunker) => chunker,
            None => Arc::from(config.chunking.build(config.chunk_size, config.chunk_overlap)?),
        };

        Ok(RagPipeline {
            config,
            embedding_provider,
            vector_store,
            chunker,
            generator,
            prompt: self.prompt.unwrap_or_default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::HashEmbeddingProvider;
    use crate::generation::MockGenerator;
    use crate::inmemory::InMemoryVectorStore;

    fn builder() -> RagPipelineBuilder {
        RagPipeline::builder()
            .config(RagConfig::default())
            .embedding_provider(Arc::new(HashEmbeddingProvider::new(32).unwrap()))
            .vector_store(Arc::new(InMemoryVectorStore::new()))
            .generator(Arc::new(MockGenerator::fixed("ok")))
    }

    #[test]
    fn builder_requires_generator() {
        let err = RagPipeline::builder()
            .config(RagConfig::default())
            .embedding_provider(Arc::new(HashEmbeddingProvider::default()))
            .vector_store(Arc::new(InMemoryVectorStore::new()))
            .build()
            .err()
            .unwrap();
        assert!(matches!(err, RagError::Config(msg) if msg.contains("generator")));
    }

    #[test]
    fn builder_validates_config() {
        let mut config = RagConfig::default();
        config.top_k = 0;
        assert!(builder().config(config).build().is_err());
    }

    #[tokio::test]
    async fn zero_k_is_a_config_error() {
        let pipeline = builder().build().unwrap();
        pipeline.create_collection().await.unwrap();
        assert!(matches!(pipeline.retrieve("q", 0).await, Err(RagError::Config(_))));
    }

    #[tokio::test]
    async fn missing_collection_propagates() {
        let pipeline = builder().build().unwrap();
        let err = pipeline.answer("q").await.unwrap_err();
        assert!(matches!(err, RagError::CollectionNotFound { .. }));
        assert!(pipeline.collection_info().await.unwrap().is_none());
    }
}
