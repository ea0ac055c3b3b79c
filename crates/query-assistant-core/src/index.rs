//! Vector index over the chunks of the active document.
//!
//! A [`VectorIndex`] owns one namespace in an [`IndexStore`] and moves
//! through three states:
//!
//! ```text
//! Empty ──build()──▶ Building ──ok──▶ Ready
//!   ▲                   │               │
//!   └──────failure──────┘◀───build()────┘
//! ```
//!
//! While a build is running, [`search`](VectorIndex::search) and any second
//! [`build`](VectorIndex::build) fail with [`RagError::IndexBuilding`]; the
//! previous index is never served once a rebuild starts. A failed or
//! cancelled build leaves the index `Empty`.
//!
//! # Similarity
//!
//! Vectors are L2-normalized when stored and query vectors are normalized
//! before scoring, so the score is the cosine similarity computed as a dot
//! product. Results are ordered by score descending, then by chunk id
//! ascending.

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::embedding::{dot, l2_normalize, EmbeddingProvider};
use crate::error::{RagError, Result};
use crate::models::{Chunk, IndexEntry, SearchHit};
use crate::store::{IndexSnapshot, IndexStore};

/// Default number of chunk texts sent per `embed_batch` call.
pub const DEFAULT_EMBED_BATCH: usize = 64;

/// Built, queryable index contents.
#[derive(Debug)]
struct ReadyIndex {
    document_id: String,
    entries: Vec<IndexEntry>,
}

#[derive(Debug)]
enum IndexState {
    Empty,
    Building,
    Ready(Arc<ReadyIndex>),
}

/// Observable lifecycle of a [`VectorIndex`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexStatus {
    Empty,
    Building,
    Ready { document_id: String, chunks: usize },
}

/// Vector index bound to one persistence namespace.
pub struct VectorIndex {
    namespace: String,
    store: Arc<dyn IndexStore>,
    batch_size: usize,
    state: RwLock<IndexState>,
}

impl VectorIndex {
    pub fn new(namespace: impl Into<String>, store: Arc<dyn IndexStore>) -> Self {
        Self {
            namespace: namespace.into(),
            store,
            batch_size: DEFAULT_EMBED_BATCH,
            state: RwLock::new(IndexState::Empty),
        }
    }

    /// Override how many chunk texts go into one embedding call.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn status(&self) -> IndexStatus {
        match self.read_state().as_deref() {
            Ok(IndexState::Empty) | Err(_) => IndexStatus::Empty,
            Ok(IndexState::Building) => IndexStatus::Building,
            Ok(IndexState::Ready(ready)) => IndexStatus::Ready {
                document_id: ready.document_id.clone(),
                chunks: ready.entries.len(),
            },
        }
    }

    /// Embed `chunks` and make them the live index for `document_id`.
    ///
    /// Replaces any previous index both in memory and in the store.
    /// Returns the number of stored entries.
    ///
    /// # Errors
    ///
    /// - [`RagError::IndexBuilding`] if another build is running.
    /// - [`RagError::EmptyDocument`] if `chunks` is empty.
    /// - [`RagError::ProviderUnavailable`] if embedding fails or returns
    ///   vectors of the wrong count or dimension.
    /// - [`RagError::Store`] if persisting fails.
    pub async fn build(
        &self,
        provider: &dyn EmbeddingProvider,
        document_id: &str,
        chunks: &[Chunk],
    ) -> Result<usize> {
        let mut guard = self.begin_build()?;
        tracing::info!(
            namespace = %self.namespace,
            chunks = chunks.len(),
            model = provider.model_name(),
            "building vector index"
        );

        match self.embed_and_persist(provider, document_id, chunks).await {
            Ok(ready) => {
                let count = ready.entries.len();
                *self.write_state()? = IndexState::Ready(Arc::new(ready));
                guard.disarm();
                tracing::info!(namespace = %self.namespace, entries = count, "vector index ready");
                Ok(count)
            }
            Err(err) => {
                drop(guard);
                if let Err(clear_err) = self.store.clear(&self.namespace).await {
                    tracing::warn!(
                        namespace = %self.namespace,
                        error = %clear_err,
                        "failed to clear persisted index after failed build"
                    );
                }
                tracing::warn!(namespace = %self.namespace, error = %err, "vector index build failed");
                Err(err)
            }
        }
    }

    async fn embed_and_persist(
        &self,
        provider: &dyn EmbeddingProvider,
        document_id: &str,
        chunks: &[Chunk],
    ) -> Result<ReadyIndex> {
        if chunks.is_empty() {
            return Err(RagError::EmptyDocument);
        }

        let mut entries = Vec::with_capacity(chunks.len());
        for batch in chunks.chunks(self.batch_size) {
            let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
            let vectors = provider.embed_batch(&texts).await?;
            if vectors.len() != batch.len() {
                return Err(RagError::ProviderUnavailable(format!(
                    "expected {} embeddings, got {}",
                    batch.len(),
                    vectors.len()
                )));
            }
            for (chunk, mut vector) in batch.iter().zip(vectors) {
                check_dims(provider.dims(), vector.len())?;
                l2_normalize(&mut vector);
                entries.push(IndexEntry {
                    chunk_id: chunk.id,
                    text: chunk.text.clone(),
                    vector,
                });
            }
        }

        let dims = entries.first().map(|e| e.vector.len()).unwrap_or(0);
        if let Some(bad) = entries.iter().find(|e| e.vector.len() != dims) {
            return Err(RagError::ProviderUnavailable(format!(
                "inconsistent embedding dimensions: {} vs {}",
                bad.vector.len(),
                dims
            )));
        }

        let snapshot = IndexSnapshot {
            document_id: document_id.to_string(),
            model: provider.model_name().to_string(),
            dims,
            built_at: chrono::Utc::now().timestamp(),
            entries,
        };
        self.store.replace(&self.namespace, &snapshot).await?;

        Ok(ReadyIndex {
            document_id: snapshot.document_id,
            entries: snapshot.entries,
        })
    }

    /// Load the persisted index for this namespace.
    ///
    /// A snapshot is only used if it was embedded by the same model, with
    /// the same dimension, as `provider`; with `expected_document` set it
    /// must also come from that document. Returns the restored document
    /// id, or `None` if nothing suitable was stored.
    ///
    /// # Errors
    ///
    /// - [`RagError::IndexBuilding`] while a build is running.
    /// - [`RagError::Store`] if the store fails or a stored vector does not
    ///   have the recorded dimension.
    pub async fn restore(
        &self,
        provider: &dyn EmbeddingProvider,
        expected_document: Option<&str>,
    ) -> Result<Option<String>> {
        if matches!(*self.read_state()?, IndexState::Building) {
            return Err(RagError::IndexBuilding);
        }

        let snapshot = match self.store.load(&self.namespace).await? {
            Some(s) => s,
            None => return Ok(None),
        };
        if let Some(expected) = expected_document {
            if snapshot.document_id != expected {
                tracing::debug!(
                    namespace = %self.namespace,
                    stored = %snapshot.document_id,
                    expected,
                    "persisted index belongs to another document"
                );
                return Ok(None);
            }
        }
        let dims_differ = provider.dims() != 0 && provider.dims() != snapshot.dims;
        if snapshot.model != provider.model_name() || dims_differ {
            tracing::warn!(
                namespace = %self.namespace,
                stored_model = %snapshot.model,
                stored_dims = snapshot.dims,
                model = provider.model_name(),
                dims = provider.dims(),
                "persisted index was embedded by another model; ingest the document again"
            );
            return Ok(None);
        }
        if let Some(bad) = snapshot.entries.iter().find(|e| e.vector.len() != snapshot.dims) {
            return Err(RagError::Store(format!(
                "persisted chunk {} has {} dimensions, index records {}",
                bad.chunk_id,
                bad.vector.len(),
                snapshot.dims
            )));
        }

        let mut entries = snapshot.entries;
        entries.sort_by_key(|e| e.chunk_id);
        for entry in entries.iter_mut() {
            l2_normalize(&mut entry.vector);
        }

        let mut state = self.write_state()?;
        if matches!(*state, IndexState::Building) {
            return Err(RagError::IndexBuilding);
        }
        let document_id = snapshot.document_id;
        *state = IndexState::Ready(Arc::new(ReadyIndex {
            document_id: document_id.clone(),
            entries,
        }));
        Ok(Some(document_id))
    }

    /// Drop the index from memory and from the store.
    pub async fn clear(&self) -> Result<()> {
        {
            let mut state = self.write_state()?;
            if matches!(*state, IndexState::Building) {
                return Err(RagError::IndexBuilding);
            }
            *state = IndexState::Empty;
        }
        self.store.clear(&self.namespace).await?;
        tracing::debug!(namespace = %self.namespace, "vector index cleared");
        Ok(())
    }

    /// Return up to `k` stored chunks most similar to `query_vector`.
    ///
    /// # Errors
    ///
    /// - [`RagError::IndexNotReady`] if nothing has been built or the index
    ///   holds no chunks.
    /// - [`RagError::IndexBuilding`] while a build is running.
    /// - [`RagError::ProviderUnavailable`] if the query dimension differs
    ///   from the index.
    pub fn search(&self, query_vector: &[f32], k: usize) -> Result<Vec<SearchHit>> {
        let ready = match &*self.read_state()? {
            IndexState::Empty => return Err(RagError::IndexNotReady),
            IndexState::Building => return Err(RagError::IndexBuilding),
            IndexState::Ready(ready) => Arc::clone(ready),
        };
        if ready.entries.is_empty() {
            return Err(RagError::IndexNotReady);
        }

        let dims = ready.entries[0].vector.len();
        if query_vector.len() != dims {
            return Err(RagError::ProviderUnavailable(format!(
                "query vector has {} dimensions, index has {}",
                query_vector.len(),
                dims
            )));
        }

        let mut query = query_vector.to_vec();
        l2_normalize(&mut query);

        let mut hits: Vec<SearchHit> = ready
            .entries
            .iter()
            .map(|e| SearchHit {
                chunk_id: e.chunk_id,
                text: e.text.clone(),
                score: dot(&query, &e.vector),
            })
            .collect();

        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.chunk_id.cmp(&b.chunk_id))
        });
        hits.truncate(k);
        Ok(hits)
    }

    fn begin_build(&self) -> Result<BuildGuard<'_>> {
        let mut state = self.write_state()?;
        if matches!(*state, IndexState::Building) {
            return Err(RagError::IndexBuilding);
        }
        *state = IndexState::Building;
        Ok(BuildGuard {
            index: self,
            armed: true,
        })
    }

    fn read_state(&self) -> Result<RwLockReadGuard<'_, IndexState>> {
        self.state
            .read()
            .map_err(|_| RagError::Store("index state lock poisoned".to_string()))
    }

    fn write_state(&self) -> Result<RwLockWriteGuard<'_, IndexState>> {
        self.state
            .write()
            .map_err(|_| RagError::Store("index state lock poisoned".to_string()))
    }
}

fn check_dims(expected: usize, actual: usize) -> Result<()> {
    if expected != 0 && expected != actual {
        return Err(RagError::ProviderUnavailable(format!(
            "embedding has {} dimensions, provider declares {}",
            actual, expected
        )));
    }
    Ok(())
}

/// Resets the index to `Empty` if a build ends without reaching `Ready`,
/// including when the build future is dropped mid-flight.
struct BuildGuard<'a> {
    index: &'a VectorIndex,
    armed: bool,
}

impl BuildGuard<'_> {
    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for BuildGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            if let Ok(mut state) = self.index.state.write() {
                *state = IndexState::Empty;
            }
        }
    }
}
