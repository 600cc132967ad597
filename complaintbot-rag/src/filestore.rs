//! Persistent vector store backed by JSON Lines files.
//!
//! Every collection lives in its own directory under the store root:
//!
//! ```text
//! <root>/<collection>/collection.json   name, metric, dimensions, created_at
//! <root>/<collection>/documents.jsonl   one IndexedDocument per line
//! ```
//!
//! Documents are appended and flushed before [`VectorStore::upsert`] returns,
//! so an interrupted indexing run leaves every completed upsert on disk. A
//! trailing line cut short by a crash is dropped (with a warning) the next
//! time the collection is opened.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use crate::document::{IndexedDocument, QueryHit};
use crate::error::{RagError, Result};
use crate::inmemory::MemoryCollection;
use crate::vectorstore::{CollectionInfo, DistanceMetric, VectorStore, validate_k};

const BACKEND: &str = "File";
const META_FILE: &str = "collection.json";
const META_TMP_FILE: &str = "collection.json.tmp";
const DOCUMENTS_FILE: &str = "documents.jsonl";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CollectionMeta {
    name: String,
    metric: DistanceMetric,
    dimensions: Option<usize>,
    created_at: DateTime<Utc>,
}

/// A [`VectorStore`] persisted under a directory on the local file system.
///
/// Collections are read into memory lazily, on the first operation that
/// names them, and searched with exact k-NN.
///
/// # Example
///
/// ```rust,ignore
/// use complaintbot_rag::{DistanceMetric, FileVectorStore, VectorStore};
///
/// let store = FileVectorStore::open("complaint_db").await?;
/// store.create_collection("financial_complaints", DistanceMetric::Cosine).await?;
/// ```
#[derive(Debug)]
pub struct FileVectorStore {
    root: PathBuf,
    collections: RwLock<HashMap<String, MemoryCollection>>,
}

impl FileVectorStore {
    /// Open (creating if needed) a store rooted at `root`.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        tokio::fs::create_dir_all(&root).await.map_err(|e| {
            error!(
                backend = BACKEND,
                path = %root.display(),
                error = %e,
                "cannot create store root"
            );
            RagError::store(BACKEND, format!("cannot create {}: {e}", root.display()))
        })?;
        info!(backend = BACKEND, path = %root.display(), "vector store opened");
        Ok(Self { root, collections: RwLock::new(HashMap::new()) })
    }

    /// The directory this store lives in.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn collection_dir(&self, name: &str) -> Result<PathBuf> {
        let valid = !name.is_empty()
            && name != "."
            && name != ".."
            && !name.contains(['/', '\\'])
            && !name.starts_with('.');
        if !valid {
            return Err(RagError::Config(format!("invalid collection name '{name}'")));
        }
        Ok(self.root.join(name))
    }

    /// Replace `collection.json` atomically: write a sibling temp file, sync
    /// it, then rename it over the old one.
    async fn write_meta(&self, dir: &Path, meta: &CollectionMeta) -> Result<()> {
        let json = serde_json::to_vec_pretty(meta)?;
        let tmp = dir.join(META_TMP_FILE);
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(&json).await?;
        file.flush().await?;
        file.sync_data().await?;
        drop(file);
        tokio::fs::rename(&tmp, dir.join(META_FILE)).await?;
        Ok(())
    }

    async fn read_meta(&self, dir: &Path) -> Result<Option<CollectionMeta>> {
        match tokio::fs::read(dir.join(META_FILE)).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Make sure `name` is in the cache, reading it from disk if necessary.
    ///
    /// Returns `None` if the collection exists neither in memory nor on disk.
    async fn load<'a>(
        &self,
        cache: &'a mut HashMap<String, MemoryCollection>,
        name: &str,
    ) -> Result<Option<&'a mut MemoryCollection>> {
        if cache.contains_key(name) {
            return Ok(cache.get_mut(name));
        }

        let dir = self.collection_dir(name)?;
        let Some(meta) = self.read_meta(&dir).await? else {
            return Ok(None);
        };

        let mut collection = MemoryCollection::new(meta.metric);
        collection.dimensions = meta.dimensions;
        for doc in read_documents(&dir.join(DOCUMENTS_FILE)).await? {
            if collection.dimensions.is_none() {
                collection.dimensions = Some(doc.embedding.len());
            }
            collection.documents.entry(doc.id.clone()).or_insert(doc);
        }
        debug!(
            backend = BACKEND,
            collection = name,
            count = collection.documents.len(),
            "collection loaded"
        );

        cache.insert(name.to_string(), collection);
        Ok(cache.get_mut(name))
    }

    /// Run `f` against a loaded collection.
    async fn with_collection<T>(
        &self,
        name: &str,
        f: impl FnOnce(&MemoryCollection) -> Result<T>,
    ) -> Result<T> {
        {
            let cache = self.collections.read().await;
            if let Some(collection) = cache.get(name) {
                return f(collection);
            }
        }
        let mut cache = self.collections.write().await;
        let collection = self.load(&mut cache, name).await?.ok_or_else(|| not_found(name))?;
        f(collection)
    }
}

fn not_found(collection: &str) -> RagError {
    RagError::CollectionNotFound { collection: collection.to_string() }
}

/// Read a documents file, dropping an unparseable final line.
///
/// A damaged trailing line is cut from the file so later appends start on a
/// clean line. Damage anywhere else is an error. The file is read as bytes
/// because a crash can cut a line inside a multi-byte character.
async fn read_documents(path: &Path) -> Result<Vec<IndexedDocument>> {
    let content = match tokio::fs::read(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let lines: Vec<&[u8]> = content.split_inclusive(|&b| b == b'\n').collect();
    let mut documents = Vec::with_capacity(lines.len());
    let mut valid_len = 0usize;

    for (idx, line) in lines.iter().enumerate() {
        let trimmed = line.trim_ascii();
        if trimmed.is_empty() {
            valid_len += line.len();
            continue;
        }
        match serde_json::from_slice::<IndexedDocument>(trimmed) {
            Ok(doc) if line.ends_with(b"\n") => {
                documents.push(doc);
                valid_len += line.len();
            }
            result => {
                if idx + 1 < lines.len() {
                    let reason = match result {
                        Err(e) => e.to_string(),
                        Ok(_) => "missing line terminator".to_string(),
                    };
                    error!(
                        backend = BACKEND,
                        path = %path.display(),
                        line = idx + 1,
                        "corrupt document line"
                    );
                    return Err(RagError::store(
                        BACKEND,
                        format!("{} line {}: {reason}", path.display(), idx + 1),
                    ));
                }
                warn!(
                    backend = BACKEND,
                    path = %path.display(),
                    line = idx + 1,
                    "dropping truncated trailing document line"
                );
                let file = tokio::fs::OpenOptions::new().write(true).open(path).await?;
                file.set_len(valid_len as u64).await?;
            }
        }
    }
    Ok(documents)
}

async fn append_documents(path: &Path, documents: &[IndexedDocument]) -> Result<()> {
    let mut buf = Vec::new();
    for doc in documents {
        serde_json::to_writer(&mut buf, doc)?;
        buf.push(b'\n');
    }
    let mut file = tokio::fs::OpenOptions::new().create(true).append(true).open(path).await?;
    file.write_all(&buf).await?;
    file.flush().await?;
    file.sync_data().await?;
    Ok(())
}

#[async_trait]
impl VectorStore for FileVectorStore {
    async fn create_collection(&self, name: &str, metric: DistanceMetric) -> Result<()> {
        let mut cache = self.collections.write().await;
        if self.load(&mut cache, name).await?.is_some() {
            return Ok(());
        }

        let dir = self.collection_dir(name)?;
        tokio::fs::create_dir_all(&dir).await?;
        let meta = CollectionMeta {
            name: name.to_string(),
            metric,
            dimensions: None,
            created_at: Utc::now(),
        };
        self.write_meta(&dir, &meta).await?;
        info!(backend = BACKEND, collection = name, %metric, "collection created");

        cache.insert(name.to_string(), MemoryCollection::new(metric));
        Ok(())
    }

    async fn delete_collection(&self, name: &str) -> Result<()> {
        let dir = self.collection_dir(name)?;
        let mut cache = self.collections.write().await;
        cache.remove(name);
        match tokio::fs::remove_dir_all(&dir).await {
            Ok(()) => {
                info!(backend = BACKEND, collection = name, "collection deleted");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn collection_info(&self, name: &str) -> Result<Option<CollectionInfo>> {
        let mut cache = self.collections.write().await;
        Ok(self.load(&mut cache, name).await?.map(|c| c.info(name)))
    }

    async fn upsert(&self, collection: &str, documents: &[IndexedDocument]) -> Result<usize> {
        let dir = self.collection_dir(collection)?;
        let mut cache = self.collections.write().await;
        let store = self.load(&mut cache, collection).await?.ok_or_else(|| not_found(collection))?;

        let previous_dims = store.dimensions;
        let inserted = store.insert_new(BACKEND, collection, documents)?;
        if inserted.is_empty() {
            return Ok(0);
        }

        if let Err(e) = append_documents(&dir.join(DOCUMENTS_FILE), &inserted).await {
            error!(backend = BACKEND, collection, error = %e, "append failed");
            for doc in &inserted {
                store.documents.remove(&doc.id);
            }
            store.dimensions = previous_dims;
            return Err(e);
        }

        // The documents are committed at this point. A failed metadata update
        // only loses the recorded dimensions, which the next load recovers
        // from the first document.
        if previous_dims.is_none() {
            let created_at = match self.read_meta(&dir).await {
                Ok(Some(meta)) => meta.created_at,
                _ => Utc::now(),
            };
            let meta = CollectionMeta {
                name: collection.to_string(),
                metric: store.metric,
                dimensions: store.dimensions,
                created_at,
            };
            if let Err(e) = self.write_meta(&dir, &meta).await {
                warn!(backend = BACKEND, collection, error = %e, "metadata update failed");
            }
        }

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
        self.with_collection(collection, |c| Ok(c.documents.contains_key(id))).await
    }

    async fn list_ids(&self, collection: &str) -> Result<HashSet<String>> {
        self.with_collection(collection, |c| Ok(c.documents.keys().cloned().collect())).await
    }

    async fn get(&self, collection: &str, ids: &[&str]) -> Result<Vec<IndexedDocument>> {
        self.with_collection(collection, |c| Ok(c.get(ids))).await
    }

    async fn query(&self, collection: &str, embedding: &[f32], k: usize) -> Result<Vec<QueryHit>> {
        validate_k(k)?;
        self.with_collection(collection, |c| c.query(BACKEND, collection, embedding, k)).await
    }

    async fn count(&self, collection: &str) -> Result<usize> {
        self.with_collection(collection, |c| Ok(c.documents.len())).await
    }
}
