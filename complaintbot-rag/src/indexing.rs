//! Idempotent indexing of complaint records into a collection.
//!
//! One run moves through [`IndexStage`]s in order:
//!
//! ```text
//! Init → [Loading] → Chunking → DedupCheck → (Embedding → Upserting)* → Done
//! ```
//!
//! The existing ids are read once, in `DedupCheck`; chunks already stored
//! (or repeated within the run) are skipped, so re-running on unchanged
//! input adds nothing. A chunk whose embedding or upsert fails is logged
//! and counted, and the run carries on with the next one.

use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::chunking::Chunker;
use crate::collection::Collection;
use crate::document::{Chunk, ChunkMetadata, ComplaintRecord, IndexedDocument};
use crate::embedding::ensure_batch_len;
use crate::error::{RagError, Result};
use crate::records::{CleaningOptions, clean_records, load_records};

/// Stage of an indexing run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexStage {
    /// Run started.
    Init,
    /// Reading and cleaning the dataset.
    Loading,
    /// Splitting narratives into chunks.
    Chunking,
    /// Comparing chunk ids against the store snapshot.
    DedupCheck,
    /// Embedding a batch of new chunks.
    Embedding,
    /// Writing an embedded batch to the store.
    Upserting,
    /// Run finished.
    Done,
}

impl fmt::Display for IndexStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            IndexStage::Init => "init",
            IndexStage::Loading => "loading",
            IndexStage::Chunking => "chunking",
            IndexStage::DedupCheck => "dedup_check",
            IndexStage::Embedding => "embedding",
            IndexStage::Upserting => "upserting",
            IndexStage::Done => "done",
        };
        f.write_str(name)
    }
}

/// Outcome of an indexing run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexReport {
    /// Records processed.
    pub records: usize,
    /// Chunks produced from those records.
    pub chunks: usize,
    /// Chunks newly stored.
    pub added: usize,
    /// Chunks already present (or repeated within the run).
    pub skipped: usize,
    /// Chunks lost to embedding or store failures.
    pub failed: usize,
    /// Documents in the collection after the run.
    pub total: usize,
}

impl fmt::Display for IndexReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} records, {} chunks: {} added, {} skipped, {} failed; collection now holds {} documents",
            self.records, self.chunks, self.added, self.skipped, self.failed, self.total
        )
    }
}

struct PendingChunk {
    id: String,
    chunk: Chunk,
    metadata: ChunkMetadata,
}

fn enter(stage: IndexStage) {
    debug!(%stage, "indexing stage");
}

/// Chunks, embeds and stores complaint records.
///
/// # Example
///
/// ```rust,ignore
/// use complaintbot_rag::{Collection, FixedSizeChunker, Indexer};
///
/// let indexer = Indexer::new(Arc::new(FixedSizeChunker::new(512, 50)?), collection, 64)?;
/// let report = indexer.index_records(&records).await?;
/// println!("{report}");
/// ```
pub struct Indexer {
    chunker: Arc<dyn Chunker>,
    collection: Collection,
    embed_batch_size: usize,
    cleaning: CleaningOptions,
}

impl Indexer {
    /// Create an indexer writing into `collection`.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Config`] if `embed_batch_size == 0`.
    pub fn new(
        chunker: Arc<dyn Chunker>,
        collection: Collection,
        embed_batch_size: usize,
    ) -> Result<Self> {
        if embed_batch_size == 0 {
            return Err(RagError::Config("embed_batch_size must be greater than zero".to_string()));
        }
        Ok(Self { chunker, collection, embed_batch_size, cleaning: CleaningOptions::default() })
    }

    /// Cleaning applied by [`index_csv`](Self::index_csv).
    pub fn with_cleaning(mut self, cleaning: CleaningOptions) -> Self {
        self.cleaning = cleaning;
        self
    }

    /// The target collection.
    pub fn collection(&self) -> &Collection {
        &self.collection
    }

    /// Load, clean and index a complaint CSV.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Load`] if the file cannot be read, plus any error
    /// [`index_records`](Self::index_records) returns.
    pub async fn index_csv(&self, path: impl AsRef<Path>) -> Result<IndexReport> {
        enter(IndexStage::Init);
        enter(IndexStage::Loading);
        let path: PathBuf = path.as_ref().to_path_buf();
        let load_path = path.clone();
        let records = tokio::task::spawn_blocking(move || load_records(load_path))
            .await
            .map_err(|e| RagError::Load { path, message: format!("loader task failed: {e}") })??;
        let records = clean_records(records, &self.cleaning);
        self.run(&records).await
    }

    /// Index `records`, skipping chunks the collection already holds.
    ///
    /// # Errors
    ///
    /// Fails only if the collection cannot be read (for example
    /// [`RagError::CollectionNotFound`]). Per-chunk embedding and upsert
    /// failures are counted in [`IndexReport::failed`] instead.
    pub async fn index_records(&self, records: &[ComplaintRecord]) -> Result<IndexReport> {
        enter(IndexStage::Init);
        self.run(records).await
    }

    async fn run(&self, records: &[ComplaintRecord]) -> Result<IndexReport> {
        let mut report = IndexReport { records: records.len(), ..Default::default() };

        enter(IndexStage::Chunking);
        let mut chunks = Vec::new();
        for record in records {
            let metadata = ChunkMetadata::for_record(record);
            for chunk in self.chunker.chunk_record(record) {
                chunks.push(PendingChunk { id: chunk.id(), chunk, metadata: metadata.clone() });
            }
        }
        report.chunks = chunks.len();

        enter(IndexStage::DedupCheck);
        let existing = self.collection.list_ids().await?;
        let mut seen: HashSet<String> = HashSet::with_capacity(chunks.len());
        let mut pending = Vec::new();
        for chunk in chunks {
            if existing.contains(&chunk.id) || !seen.insert(chunk.id.clone()) {
                report.skipped += 1;
            } else {
                pending.push(chunk);
            }
        }
        debug!(new = pending.len(), skipped = report.skipped, "dedup check complete");

        for (batch_no, batch) in pending.chunks(self.embed_batch_size).enumerate() {
            enter(IndexStage::Embedding);
            let documents = self.embed_batch(batch_no, batch, &mut report.failed).await;

            enter(IndexStage::Upserting);
            let (added, skipped, failed) = self.upsert_batch(batch_no, &documents).await;
            report.added += added;
            report.skipped += skipped;
            report.failed += failed;
        }

        report.total = self.collection.count().await?;
        enter(IndexStage::Done);
        info!(
            collection = self.collection.name(),
            records = report.records,
            chunks = report.chunks,
            added = report.added,
            skipped = report.skipped,
            failed = report.failed,
            total = report.total,
            "indexing complete"
        );
        Ok(report)
    }

    /// Embed one batch, falling back to one call per chunk if the batch call
    /// fails. Chunks that cannot be embedded are counted in `failed`.
    async fn embed_batch(
        &self,
        batch_no: usize,
        batch: &[PendingChunk],
        failed: &mut usize,
    ) -> Vec<IndexedDocument> {
        let embedder = self.collection.embedder();
        let texts: Vec<&str> = batch.iter().map(|p| p.chunk.text.as_str()).collect();

        let batch_result = match embedder.embed_batch(&texts).await {
            Ok(vectors) => ensure_batch_len(embedder.name(), texts.len(), vectors),
            Err(e) => Err(e),
        };

        let vectors: Vec<Option<Vec<f32>>> = match batch_result {
            Ok(vectors) => vectors.into_iter().map(Some).collect(),
            Err(e) => {
                warn!(
                    batch = batch_no,
                    size = batch.len(),
                    error = %e,
                    "batch embedding failed, retrying chunks one by one"
                );
                let mut vectors = Vec::with_capacity(batch.len());
                for pending in batch {
                    match embedder.embed(&pending.chunk.text).await {
                        Ok(vector) => vectors.push(Some(vector)),
                        Err(e) => {
                            warn!(
                                chunk_id = %pending.id,
                                error = %e,
                                "skipping chunk: embedding failed"
                            );
                            vectors.push(None);
                        }
                    }
                }
                vectors
            }
        };

        batch
            .iter()
            .zip(vectors)
            .filter_map(|(pending, vector)| match vector {
                Some(embedding) => Some(IndexedDocument {
                    id: pending.id.clone(),
                    text: pending.chunk.text.clone(),
                    embedding,
                    metadata: pending.metadata.clone(),
                }),
                None => {
                    *failed += 1;
                    None
                }
            })
            .collect()
    }

    /// Store one embedded batch, falling back to one upsert per document if
    /// the batch upsert fails. Returns `(added, skipped, failed)`.
    async fn upsert_batch(
        &self,
        batch_no: usize,
        documents: &[IndexedDocument],
    ) -> (usize, usize, usize) {
        if documents.is_empty() {
            return (0, 0, 0);
        }

        match self.collection.upsert_documents(documents).await {
            Ok(added) => return (added, documents.len().saturating_sub(added), 0),
            Err(e) => {
                warn!(
                    batch = batch_no,
                    size = documents.len(),
                    error = %e,
                    "batch upsert failed, retrying documents one by one"
                );
            }
        }

        let (mut added, mut skipped, mut failed) = (0, 0, 0);
        for document in documents {
            match self.collection.upsert_documents(std::slice::from_ref(document)).await {
                Ok(1) => added += 1,
                Ok(_) => skipped += 1,
                Err(e) => {
                    warn!(chunk_id = %document.id, error = %e, "skipping chunk: upsert failed");
                    failed += 1;
                }
            }
        }
        (added, skipped, failed)
    }
}
