//! Retrieval-augmented question answering over consumer complaint narratives.
//!
//! This crate provides:
//! - Complaint CSV loading and cleaning
//! - Character-window and separator-aware chunkers
//! - Embedding, vector store and generation adapter traits
//! - In-memory and file-backed vector stores with exact k-NN search
//! - An idempotent indexing pipeline with per-run reports
//! - Grounded answering with a fixed refusal-aware prompt
//! - A small qualitative evaluation harness
//!
//! # Feature flags
//!
//! - `openai` – embedding and generation clients for OpenAI-compatible APIs.

pub mod chunking;
pub mod collection;
pub mod config;
pub mod document;
pub mod embedding;
pub mod error;
pub mod evaluation;
pub mod filestore;
pub mod generation;
pub mod indexing;
pub mod inmemory;
#[cfg(feature = "openai")]
pub mod openai;
pub mod pipeline;
pub mod prompt;
pub mod records;
pub mod vectorstore;

pub use chunking::{Chunker, ChunkingStrategy, FixedSizeChunker, RecursiveChunker};
pub use collection::Collection;
pub use config::{EmbeddingSettings, GenerationSettings, RagConfig, RagConfigBuilder};
pub use document::{Chunk, ChunkMetadata, ComplaintRecord, IndexedDocument, QueryHit, chunk_id};
pub use embedding::{EmbeddingProvider, HashEmbeddingProvider};
pub use error::{RagError, Result};
pub use evaluation::{
    DEFAULT_EVALUATION_QUESTIONS, EvaluationRow, evaluate, preview, render_markdown,
};
pub use filestore::FileVectorStore;
pub use generation::{Generator, MockGenerator};
pub use indexing::{IndexReport, IndexStage, Indexer};
pub use inmemory::InMemoryVectorStore;
#[cfg(feature = "openai")]
pub use openai::{OpenAIEmbeddingProvider, OpenAIGenerator};
pub use pipeline::{Answer, RagPipeline, RagPipelineBuilder};
pub use prompt::{PromptTemplate, REFUSAL_ANSWER};
pub use records::{CleaningOptions, clean_records, load_records};
pub use vectorstore::{CollectionInfo, DistanceMetric, VectorStore};
