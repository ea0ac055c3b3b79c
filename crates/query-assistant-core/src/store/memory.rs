//! In-memory [`IndexStore`] implementation for testing and embedding.
//!
//! Uses a `HashMap` behind `std::sync::RwLock`. Each `replace` swaps the
//! whole snapshot under one write lock, so readers never see a partial index.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use crate::error::{RagError, Result};

use super::{IndexSnapshot, IndexStore};

/// In-memory index store.
pub struct InMemoryIndexStore {
    snapshots: RwLock<HashMap<String, IndexSnapshot>>,
}

impl InMemoryIndexStore {
    pub fn new() -> Self {
        Self {
            snapshots: RwLock::new(HashMap::new()),
        }
    }

    /// Number of namespaces currently stored.
    pub fn len(&self) -> usize {
        self.snapshots.read().map(|s| s.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for InMemoryIndexStore {
    fn default() -> Self {
        Self::new()
    }
}

fn poisoned<T>(_: T) -> RagError {
    RagError::Store("in-memory store lock poisoned".to_string())
}

#[async_trait]
impl IndexStore for InMemoryIndexStore {
    async fn replace(&self, namespace: &str, snapshot: &IndexSnapshot) -> Result<()> {
        let mut snapshots = self.snapshots.write().map_err(poisoned)?;
        snapshots.insert(namespace.to_string(), snapshot.clone());
        Ok(())
    }

    async fn load(&self, namespace: &str) -> Result<Option<IndexSnapshot>> {
        let snapshots = self.snapshots.read().map_err(poisoned)?;
        Ok(snapshots.get(namespace).cloned())
    }

    async fn clear(&self, namespace: &str) -> Result<()> {
        let mut snapshots = self.snapshots.write().map_err(poisoned)?;
        snapshots.remove(namespace);
        Ok(())
    }
}
