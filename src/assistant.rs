//! Application wiring: config → SQLite store + providers + [`QueryEngine`].
//!
//! Used by every CLI command and by the HTTP server. Sessions created here
//! persist their index under a namespace in the SQLite database.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Serialize;
use uuid::Uuid;

use query_assistant_core::embedding::EmbeddingProvider;
use query_assistant_core::generation::Generator;
use query_assistant_core::index::VectorIndex;
use query_assistant_core::models::Document;
use query_assistant_core::session::SessionContext;
use query_assistant_core::store::IndexStore;
use query_assistant_core::{BuildReport, QueryEngine};

use crate::config::Config;
use crate::embedding::create_embedder;
use crate::extract::{self, ExtractionReport};
use crate::generation::create_generator;
use crate::sqlite_store::SqliteIndexStore;
use crate::{db, migrate};

/// Outcome of ingesting one document.
#[derive(Debug, Clone, Serialize)]
pub struct IngestReport {
    pub document_id: String,
    pub chars: usize,
    pub chunks: usize,
    pub pages: usize,
    pub skipped_pages: usize,
}

impl IngestReport {
    fn new(build: BuildReport, chars: usize, extraction: ExtractionReport) -> Self {
        Self {
            document_id: build.document_id,
            chars,
            chunks: build.chunks,
            pages: extraction.pages,
            skipped_pages: extraction.skipped,
        }
    }
}

pub struct Assistant {
    config: Config,
    engine: QueryEngine,
    store: Arc<dyn IndexStore>,
}

impl Assistant {
    /// Connect to the database, run migrations and build providers from `config`.
    pub async fn from_config(config: Config) -> Result<Self> {
        let embedder = create_embedder(&config.embedding)?;
        let generator = create_generator(&config.generation)?;
        Self::with_providers(config, embedder, generator).await
    }

    /// Like [`from_config`](Self::from_config) with caller-supplied providers.
    pub async fn with_providers(
        config: Config,
        embedder: Arc<dyn EmbeddingProvider>,
        generator: Arc<dyn Generator>,
    ) -> Result<Self> {
        config.validate()?;
        let pool = db::connect(&config).await?;
        migrate::migrate_pool(&pool).await?;
        let engine = QueryEngine::new(embedder, generator, config.engine_settings())?;
        tracing::debug!(
            namespace = %config.index.namespace,
            top_k = engine.top_k(),
            "assistant ready"
        );
        Ok(Self {
            config,
            engine,
            store: Arc::new(SqliteIndexStore::new(pool)),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn engine(&self) -> &QueryEngine {
        &self.engine
    }

    /// A session bound to the configured namespace.
    pub fn session(&self) -> SessionContext {
        self.session_in(&self.config.index.namespace)
    }

    /// A session bound to `namespace`.
    pub fn session_in(&self, namespace: &str) -> SessionContext {
        self.session_with_id(Uuid::new_v4(), namespace)
    }

    pub fn session_with_id(&self, id: Uuid, namespace: &str) -> SessionContext {
        let index = VectorIndex::new(namespace, self.store.clone())
            .with_batch_size(self.config.embedding.batch_size);
        SessionContext::with_id(id, index)
    }

    /// Extract `bytes`, then chunk, embed and persist them as the session's
    /// active document.
    pub async fn ingest_bytes(
        &self,
        session: &mut SessionContext,
        bytes: &[u8],
        content_type: &str,
    ) -> Result<IngestReport> {
        let extraction = extract::extract(bytes, content_type)?;
        let document = Document::new(extraction.text);
        let chars = document.char_len();
        let build = self.engine.build(session, document).await?;
        Ok(IngestReport::new(build, chars, extraction.report))
    }

    /// Read `path` and ingest it. Without `content_type` the type is
    /// guessed from the file extension.
    pub async fn ingest_file(
        &self,
        session: &mut SessionContext,
        path: &Path,
        content_type: Option<&str>,
    ) -> Result<IngestReport> {
        let content_type = match content_type {
            Some(ct) => ct,
            None => extract::content_type_for_path(path).with_context(|| {
                format!(
                    "Cannot infer content type for {}; pass --content-type",
                    path.display()
                )
            })?,
        };
        let bytes = std::fs::read(path)
            .with_context(|| format!("Failed to read document: {}", path.display()))?;
        self.ingest_bytes(session, &bytes, content_type).await
    }

    /// Load the persisted index of the configured namespace into a new session.
    pub async fn restore_session(&self) -> Result<Option<SessionContext>> {
        let mut session = self.session();
        if self.engine.restore(&mut session, None).await? {
            Ok(Some(session))
        } else {
            Ok(None)
        }
    }
}
