//! Error types for the `complaintbot-rag` crate.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while indexing complaints or answering questions.
#[derive(Debug, Error)]
pub enum RagError {
    /// Invalid configuration, reported when a component is constructed.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The embedding backend was unavailable or rejected its input.
    #[error("Embedding error ({provider}): {message}")]
    Embedding {
        /// The embedding provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// The requested collection does not exist in the store.
    ///
    /// An existing collection with no documents is not an error; queries
    /// against it return no hits.
    #[error("Collection '{collection}' not found")]
    CollectionNotFound {
        /// Name of the missing collection.
        collection: String,
    },

    /// An error occurred in the vector store backend.
    #[error("Vector store error ({backend}): {message}")]
    Store {
        /// The vector store backend that produced the error.
        backend: String,
        /// A description of the failure.
        message: String,
    },

    /// The generation backend failed to produce text.
    #[error("Generation error ({provider}): {message}")]
    Generation {
        /// The generator that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// Retrieval succeeded but generation failed. The retrieved sources are
    /// kept so callers can still show them.
    #[error("Answer generation failed after retrieving {} source(s): {source}", sources.len())]
    GenerationFailed {
        /// Retrieved chunk texts, nearest first.
        sources: Vec<String>,
        /// The underlying generator error.
        #[source]
        source: Box<RagError>,
    },

    /// The complaint dataset could not be loaded.
    #[error("Failed to load records from {}: {message}", path.display())]
    Load {
        /// Path of the dataset.
        path: PathBuf,
        /// A description of the failure.
        message: String,
    },

    /// I/O failure outside of a more specific context.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization failure.
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
}

impl RagError {
    pub(crate) fn store(backend: &str, message: impl Into<String>) -> Self {
        RagError::Store { backend: backend.to_string(), message: message.into() }
    }

    pub(crate) fn embedding(provider: &str, message: impl Into<String>) -> Self {
        RagError::Embedding { provider: provider.to_string(), message: message.into() }
    }

    pub(crate) fn generation(provider: &str, message: impl Into<String>) -> Self {
        RagError::Generation { provider: provider.to_string(), message: message.into() }
    }
}

/// A convenience result type for RAG operations.
pub type Result<T> = std::result::Result<T, RagError>;
