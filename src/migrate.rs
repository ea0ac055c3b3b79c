use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;

/// Create the index tables on a fresh connection and close it.
pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    migrate_pool(&pool).await?;
    pool.close().await;
    Ok(())
}

/// Idempotently create the index tables on an open pool.
pub async fn migrate_pool(pool: &SqlitePool) -> Result<()> {
    // One row per namespace: the document the stored index was built from.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS indexes (
            namespace TEXT PRIMARY KEY,
            document_id TEXT NOT NULL,
            model TEXT NOT NULL,
            dims INTEGER NOT NULL,
            built_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS index_entries (
            namespace TEXT NOT NULL,
            chunk_id INTEGER NOT NULL,
            text TEXT NOT NULL,
            embedding BLOB NOT NULL,
            PRIMARY KEY (namespace, chunk_id),
            FOREIGN KEY (namespace) REFERENCES indexes(namespace) ON DELETE CASCADE
        )
        "#,
    )
    .execute(pool)
    .await?;

    tracing::debug!("index schema up to date");
    Ok(())
}
