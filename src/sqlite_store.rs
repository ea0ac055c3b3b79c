//! SQLite-backed [`IndexStore`] implementation.
//!
//! One row in `indexes` per namespace plus one row in `index_entries` per
//! chunk, with vectors stored as little-endian `f32` blobs. `replace` runs
//! inside a single transaction so a reader sees either the old index or the
//! new one.

use async_trait::async_trait;
use sqlx::{Row, SqlitePool};

use query_assistant_core::embedding::{blob_to_vec, vec_to_blob};
use query_assistant_core::models::IndexEntry;
use query_assistant_core::store::{IndexSnapshot, IndexStore};
use query_assistant_core::{RagError, Result};

/// SQLite implementation of the [`IndexStore`] trait.
pub struct SqliteIndexStore {
    pool: SqlitePool,
}

impl SqliteIndexStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn store_err(e: sqlx::Error) -> RagError {
    RagError::Store(e.to_string())
}

#[async_trait]
impl IndexStore for SqliteIndexStore {
    async fn replace(&self, namespace: &str, snapshot: &IndexSnapshot) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(store_err)?;

        sqlx::query("DELETE FROM index_entries WHERE namespace = ?")
            .bind(namespace)
            .execute(&mut *tx)
            .await
            .map_err(store_err)?;

        sqlx::query(
            r#"
            INSERT INTO indexes (namespace, document_id, model, dims, built_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(namespace) DO UPDATE SET
                document_id = excluded.document_id,
                model = excluded.model,
                dims = excluded.dims,
                built_at = excluded.built_at
            "#,
        )
        .bind(namespace)
        .bind(&snapshot.document_id)
        .bind(&snapshot.model)
        .bind(snapshot.dims as i64)
        .bind(snapshot.built_at)
        .execute(&mut *tx)
        .await
        .map_err(store_err)?;

        for entry in &snapshot.entries {
            sqlx::query(
                "INSERT INTO index_entries (namespace, chunk_id, text, embedding) VALUES (?, ?, ?, ?)",
            )
            .bind(namespace)
            .bind(entry.chunk_id)
            .bind(&entry.text)
            .bind(vec_to_blob(&entry.vector))
            .execute(&mut *tx)
            .await
            .map_err(store_err)?;
        }

        tx.commit().await.map_err(store_err)?;
        tracing::debug!(
            namespace,
            entries = snapshot.entries.len(),
            "persisted index snapshot"
        );
        Ok(())
    }

    async fn load(&self, namespace: &str) -> Result<Option<IndexSnapshot>> {
        // Header and entries come from one read transaction so a concurrent
        // `replace` cannot interleave.
        let mut tx = self.pool.begin().await.map_err(store_err)?;

        let header = sqlx::query(
            "SELECT document_id, model, dims, built_at FROM indexes WHERE namespace = ?",
        )
        .bind(namespace)
        .fetch_optional(&mut *tx)
        .await
        .map_err(store_err)?;

        let header = match header {
            Some(row) => row,
            None => return Ok(None),
        };

        let rows = sqlx::query(
            "SELECT chunk_id, text, embedding FROM index_entries WHERE namespace = ? ORDER BY chunk_id",
        )
        .bind(namespace)
        .fetch_all(&mut *tx)
        .await
        .map_err(store_err)?;
        tx.commit().await.map_err(store_err)?;

        let entries = rows
            .iter()
            .map(|row| {
                let blob: Vec<u8> = row.get("embedding");
                IndexEntry {
                    chunk_id: row.get("chunk_id"),
                    text: row.get("text"),
                    vector: blob_to_vec(&blob),
                }
            })
            .collect();

        let dims: i64 = header.get("dims");
        Ok(Some(IndexSnapshot {
            document_id: header.get("document_id"),
            model: header.get("model"),
            dims: dims.max(0) as usize,
            built_at: header.get("built_at"),
            entries,
        }))
    }

    async fn clear(&self, namespace: &str) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(store_err)?;
        sqlx::query("DELETE FROM index_entries WHERE namespace = ?")
            .bind(namespace)
            .execute(&mut *tx)
            .await
            .map_err(store_err)?;
        sqlx::query("DELETE FROM indexes WHERE namespace = ?")
            .bind(namespace)
            .execute(&mut *tx)
            .await
            .map_err(store_err)?;
        tx.commit().await.map_err(store_err)?;
        Ok(())
    }
}
