//! Index persistence abstraction.
//!
//! The [`IndexStore`] trait is the durable key-value boundary of the
//! pipeline: it maps a namespace key to the serialized set of
//! (chunk id, vector, text) triples of one built index. Backends include
//! SQLite (app crate) and the in-memory [`memory::InMemoryIndexStore`].
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::IndexEntry;

/// Everything persisted for one built index.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexSnapshot {
    /// Content hash of the document the index was built from.
    pub document_id: String,
    /// Embedding model that produced the vectors.
    pub model: String,
    /// Vector dimensionality.
    pub dims: usize,
    /// Unix timestamp of the build.
    pub built_at: i64,
    /// Entries in chunk order.
    pub entries: Vec<IndexEntry>,
}

/// Durable storage for built indexes.
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`replace`](IndexStore::replace) | Atomically swap the index stored under a namespace |
/// | [`load`](IndexStore::load) | Read the index stored under a namespace |
/// | [`clear`](IndexStore::clear) | Remove the index stored under a namespace |
#[async_trait]
pub trait IndexStore: Send + Sync {
    /// Replace whatever is stored under `namespace` with `snapshot`.
    ///
    /// Readers observe either the old or the new snapshot, never a mix.
    async fn replace(&self, namespace: &str, snapshot: &IndexSnapshot) -> Result<()>;

    /// Load the snapshot stored under `namespace`, if any.
    async fn load(&self, namespace: &str) -> Result<Option<IndexSnapshot>>;

    /// Remove the snapshot stored under `namespace`. Missing keys are not an error.
    async fn clear(&self, namespace: &str) -> Result<()>;
}
