//! Configuration for indexing and answering.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::chunking::ChunkingStrategy;
use crate::error::{RagError, Result};
use crate::records::CleaningOptions;
use crate::vectorstore::DistanceMetric;

/// Settings for the embedding backend.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EmbeddingSettings {
    /// Model name sent to the embeddings endpoint.
    pub model: String,
    /// Base URL of an OpenAI-compatible API.
    pub base_url: String,
    /// Environment variable holding the API key.
    pub api_key_env: String,
    /// Embedding length produced by `model`.
    pub dimensions: usize,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            model: "all-MiniLM-L6-v2".to_string(),
            base_url: "https://api.openai.com/v1".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            dimensions: 384,
        }
    }
}

/// Settings for the generation backend.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GenerationSettings {
    /// Model name sent to the chat completions endpoint.
    pub model: String,
    /// Base URL of an OpenAI-compatible API.
    pub base_url: String,
    /// Environment variable holding the API key.
    pub api_key_env: String,
    /// Upper bound on generated tokens.
    pub max_tokens: u32,
    /// Sampling temperature.
    pub temperature: f32,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            model: "google/flan-t5-base".to_string(),
            base_url: "https://api.openai.com/v1".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            max_tokens: 512,
            temperature: 0.0,
        }
    }
}

/// Configuration for the whole pipeline.
///
/// Every field has a default, so a YAML file only needs the keys it changes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RagConfig {
    /// Complaint CSV to index.
    pub data_path: PathBuf,
    /// Root directory of the persistent vector store.
    pub db_path: PathBuf,
    /// Collection holding the complaint chunks.
    pub collection_name: String,
    /// Maximum chunk size in characters.
    pub chunk_size: usize,
    /// Number of overlapping characters between consecutive chunks.
    pub chunk_overlap: usize,
    /// How narratives are split.
    pub chunking: ChunkingStrategy,
    /// Number of chunks retrieved per question.
    pub top_k: usize,
    /// Number of chunk texts sent to the embedder per call while indexing.
    pub embed_batch_size: usize,
    /// Distance metric for newly created collections.
    pub distance: DistanceMetric,
    /// Lower-case narratives while cleaning.
    pub lowercase_narratives: bool,
    /// Products to keep while cleaning; empty keeps all.
    pub products: Vec<String>,
    /// Embedding backend.
    pub embedding: EmbeddingSettings,
    /// Generation backend.
    pub generation: GenerationSettings,
    /// HTTP timeout for remote backends, in seconds.
    pub request_timeout_secs: u64,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            data_path: PathBuf::from("./data/filtered_complaints.csv"),
            db_path: PathBuf::from("complaint_db"),
            collection_name: "financial_complaints".to_string(),
            chunk_size: 512,
            chunk_overlap: 50,
            chunking: ChunkingStrategy::Fixed,
            top_k: 3,
            embed_batch_size: 64,
            distance: DistanceMetric::Cosine,
            lowercase_narratives: true,
            products: Vec::new(),
            embedding: EmbeddingSettings::default(),
            generation: GenerationSettings::default(),
            request_timeout_secs: 60,
        }
    }
}

impl RagConfig {
    /// Create a new builder for constructing a [`RagConfig`].
    pub fn builder() -> RagConfigBuilder {
        RagConfigBuilder::default()
    }

    /// Read a YAML configuration file and validate it.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Config`] if the file cannot be read or parsed, or
    /// fails [`validate`](Self::validate).
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| RagError::Config(format!("cannot read {}: {e}", path.display())))?;
        Self::from_yaml_str(&raw)
            .map_err(|e| RagError::Config(format!("{}: {e}", path.display())))
    }

    /// Parse and validate a YAML configuration document.
    pub fn from_yaml_str(raw: &str) -> Result<Self> {
        let config: RagConfig =
            serde_yaml::from_str(raw).map_err(|e| RagError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check that parameters are consistent.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Config`] if:
    /// - `chunk_size == 0`
    /// - `chunk_overlap >= chunk_size`
    /// - `top_k == 0`
    /// - `embed_batch_size == 0`
    /// - `collection_name` is empty
    /// - `embedding.dimensions == 0`
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(RagError::Config("chunk_size must be greater than zero".to_string()));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(RagError::Config(format!(
                "chunk_overlap ({}) must be less than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        if self.top_k == 0 {
            return Err(RagError::Config("top_k must be greater than zero".to_string()));
        }
        if self.embed_batch_size == 0 {
            return Err(RagError::Config("embed_batch_size must be greater than zero".to_string()));
        }
        if self.collection_name.trim().is_empty() {
            return Err(RagError::Config("collection_name must not be empty".to_string()));
        }
        if self.embedding.dimensions == 0 {
            return Err(RagError::Config(
                "embedding.dimensions must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Cleaning options derived from this configuration.
    pub fn cleaning_options(&self) -> CleaningOptions {
        CleaningOptions { lowercase: self.lowercase_narratives, products: self.products.clone() }
    }
}

/// Builder for constructing a validated [`RagConfig`].
#[derive(Debug, Clone, Default)]
pub struct RagConfigBuilder {
    config: RagConfig,
}

impl RagConfigBuilder {
    /// Set the complaint CSV path.
    pub fn data_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.data_path = path.into();
        self
    }

    /// Set the vector store directory.
    pub fn db_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.db_path = path.into();
        self
    }

    /// Set the collection name.
    pub fn collection_name(mut self, name: impl Into<String>) -> Self {
        self.config.collection_name = name.into();
        self
    }

    /// Set the maximum chunk size in characters.
    pub fn chunk_size(mut self, size: usize) -> Self {
        self.config.chunk_size = size;
        self
    }

    /// Set the overlap between consecutive chunks in characters.
    pub fn chunk_overlap(mut self, overlap: usize) -> Self {
        self.config.chunk_overlap = overlap;
        self
    }

    /// Set the chunking strategy.
    pub fn chunking(mut self, strategy: ChunkingStrategy) -> Self {
        self.config.chunking = strategy;
        self
    }

    /// Set the number of chunks retrieved per question.
    pub fn top_k(mut self, k: usize) -> Self {
        self.config.top_k = k;
        self
    }

    /// Set the embedding batch size used while indexing.
    pub fn embed_batch_size(mut self, size: usize) -> Self {
        self.config.embed_batch_size = size;
        self
    }

    /// Set the distance metric for new collections.
    pub fn distance(mut self, metric: DistanceMetric) -> Self {
        self.config.distance = metric;
        self
    }

    /// Enable or disable narrative lower-casing.
    pub fn lowercase_narratives(mut self, lowercase: bool) -> Self {
        self.config.lowercase_narratives = lowercase;
        self
    }

    /// Restrict indexing to these products.
    pub fn products(mut self, products: Vec<String>) -> Self {
        self.config.products = products;
        self
    }

    /// Set the embedding backend settings.
    pub fn embedding(mut self, settings: EmbeddingSettings) -> Self {
        self.config.embedding = settings;
        self
    }

    /// Set the generation backend settings.
    pub fn generation(mut self, settings: GenerationSettings) -> Self {
        self.config.generation = settings;
        self
    }

    /// Set the HTTP timeout for remote backends.
    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.config.request_timeout_secs = secs;
        self
    }

    /// Build the [`RagConfig`], validating that parameters are consistent.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Config`] under the conditions listed on
    /// [`RagConfig::validate`].
    pub fn build(self) -> Result<RagConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
