//! Caller-facing pipeline: build an index for a document, then answer
//! questions against it.
//!
//! [`QueryEngine`] holds the providers and tuning shared by all sessions;
//! per-session state lives in [`SessionContext`]. Taking the session by
//! `&mut` means one session can only run one query at a time, in call
//! order, while different sessions proceed independently.

use std::sync::Arc;

use serde::Serialize;

use crate::answer::AnswerGenerator;
use crate::chunk::Chunker;
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::generation::Generator;
use crate::index::IndexStatus;
use crate::models::Document;
use crate::retrieve::{embed_question, nearest};
use crate::session::{QueryState, SessionContext};

/// Tuning knobs for a [`QueryEngine`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineSettings {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub top_k: usize,
    pub context_budget_tokens: usize,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            chunk_size: 500,
            chunk_overlap: 50,
            top_k: 5,
            context_budget_tokens: 3000,
        }
    }
}

/// Result of indexing a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildReport {
    pub document_id: String,
    pub chunks: usize,
}

/// Answer to one question.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AskResponse {
    pub answer: String,
    /// Texts of the chunks the answer was grounded on, most similar first.
    pub sources: Vec<String>,
    /// Retrieved chunks dropped to fit the context budget.
    pub trimmed: usize,
}

pub struct QueryEngine {
    embedder: Arc<dyn EmbeddingProvider>,
    generator: Arc<dyn Generator>,
    chunker: Chunker,
    answerer: AnswerGenerator,
    top_k: usize,
}

impl QueryEngine {
    /// # Errors
    ///
    /// [`RagError::Configuration`] when the chunker settings are invalid,
    /// `top_k` is zero, or a single chunk could exceed the context budget.
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        generator: Arc<dyn Generator>,
        settings: EngineSettings,
    ) -> Result<Self> {
        let chunker = Chunker::new(settings.chunk_size, settings.chunk_overlap)?;
        let answerer = AnswerGenerator::new(settings.context_budget_tokens)?;
        if settings.top_k == 0 {
            return Err(RagError::Configuration("top_k must be at least 1".to_string()));
        }
        if settings.chunk_size > answerer.budget_chars() {
            return Err(RagError::Configuration(format!(
                "chunk_size ({}) exceeds the context budget of {} chars",
                settings.chunk_size,
                answerer.budget_chars()
            )));
        }
        Ok(Self {
            embedder,
            generator,
            chunker,
            answerer,
            top_k: settings.top_k,
        })
    }

    pub fn chunker(&self) -> &Chunker {
        &self.chunker
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    /// Make `document` the session's active document and index it.
    ///
    /// The previous document is forgotten as soon as the build starts; on
    /// failure the session has no active document.
    pub async fn build(&self, session: &mut SessionContext, document: Document) -> Result<BuildReport> {
        session.set_document(None);
        let chunks = self.chunker.split(&document.text);
        tracing::info!(
            session = %session.id(),
            document = %document.id,
            chars = document.char_len(),
            chunks = chunks.len(),
            "indexing document"
        );

        let count = session
            .index()
            .build(self.embedder.as_ref(), &document.id, &chunks)
            .await?;
        let report = BuildReport {
            document_id: document.id.clone(),
            chunks: count,
        };
        session.set_document(Some(document));
        Ok(report)
    }

    /// Reload the session's persisted index.
    ///
    /// An index embedded by a different model than this engine's is
    /// ignored, as is one built from a different document when `expected`
    /// is set. Returns `true` when an index was restored.
    pub async fn restore(&self, session: &mut SessionContext, expected: Option<Document>) -> Result<bool> {
        let restored = session
            .index()
            .restore(self.embedder.as_ref(), expected.as_ref().map(|d| d.id.as_str()))
            .await?;
        match restored {
            Some(document_id) => {
                tracing::info!(session = %session.id(), document = %document_id, "restored persisted index");
                session.set_document(expected);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Answer `question` with the configured `top_k`.
    pub async fn ask(&self, session: &mut SessionContext, question: &str) -> Result<AskResponse> {
        self.ask_with_k(session, question, self.top_k).await
    }

    /// Answer `question` from the `k` most similar chunks.
    ///
    /// On success the answer turn is appended to the session conversation.
    /// On failure nothing is appended and the session is left `Failed`.
    /// A `k` of zero is a [`RagError::Configuration`] error.
    pub async fn ask_with_k(
        &self,
        session: &mut SessionContext,
        question: &str,
        k: usize,
    ) -> Result<AskResponse> {
        if session.state().is_terminal() {
            session.transition(QueryState::Idle);
        }

        session.transition(QueryState::Embedding);
        if k == 0 {
            return fail(session, RagError::Configuration("k must be at least 1".to_string()));
        }
        match session.index().status() {
            IndexStatus::Empty => return fail(session, RagError::IndexNotReady),
            IndexStatus::Building => return fail(session, RagError::IndexBuilding),
            IndexStatus::Ready { chunks: 0, .. } => return fail(session, RagError::IndexNotReady),
            IndexStatus::Ready { .. } => {}
        }
        let query_vector = match embed_question(self.embedder.as_ref(), question).await {
            Ok(v) => v,
            Err(err) => return fail(session, err),
        };

        session.transition(QueryState::Retrieving);
        let hits = match nearest(session.index(), &query_vector, k) {
            Ok(hits) => hits,
            Err(err) => return fail(session, err),
        };

        session.transition(QueryState::Generating);
        let answer = match self
            .answerer
            .answer(self.generator.as_ref(), question, &hits)
            .await
        {
            Ok(answer) => answer,
            Err(err) => return fail(session, err),
        };

        session.transition(QueryState::Done);
        let response = AskResponse {
            answer: answer.text.clone(),
            sources: answer.used_chunks.iter().map(|h| h.text.clone()).collect(),
            trimmed: answer.trimmed,
        };
        session
            .conversation_mut()
            .push_answer(answer.text, answer.used_chunks);
        Ok(response)
    }
}

fn fail<T>(session: &mut SessionContext, err: RagError) -> Result<T> {
    tracing::warn!(session = %session.id(), code = err.code(), error = %err, "query failed");
    session.transition(QueryState::Failed);
    Err(err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::VectorIndex;
    use crate::session::ConversationTurn;
    use crate::store::memory::InMemoryIndexStore;
    use crate::testing::{FailingGenerator, KeywordEmbedder, ScriptedGenerator};
    use futures::executor::block_on;

    const REPORT: &str = "The report covers renewable energy. \
        Solar capacity doubled over five years. \
        Battery prices fell sharply. \
        The main recommendation is to expand grid storage.";

    fn settings() -> EngineSettings {
        EngineSettings {
            chunk_size: 60,
            chunk_overlap: 10,
            top_k: 3,
            context_budget_tokens: 100,
        }
    }

    fn engine_with(generator: Arc<dyn Generator>) -> QueryEngine {
        let embedder = Arc::new(KeywordEmbedder::new(&[
            "solar",
            "battery",
            "recommendation",
            "renewable",
        ]));
        QueryEngine::new(embedder, generator, settings()).unwrap()
    }

    fn session() -> SessionContext {
        SessionContext::new(VectorIndex::new("ns", Arc::new(InMemoryIndexStore::new())))
    }

    #[test]
    fn test_ask_without_index_is_not_ready() {
        let engine = engine_with(Arc::new(ScriptedGenerator::new("unused")));
        let mut session = session();
        let err = block_on(engine.ask(&mut session, "What is the topic?")).unwrap_err();
        assert_eq!(err, RagError::IndexNotReady);
        assert_eq!(session.state(), QueryState::Failed);
        assert!(session.conversation().is_empty());
    }

    #[test]
    fn test_ask_with_zero_k_is_rejected_before_embedding() {
        let generator = Arc::new(ScriptedGenerator::new("made up"));
        let engine = engine_with(generator.clone());
        let mut session = session();
        block_on(engine.build(&mut session, Document::new(REPORT))).unwrap();

        let err = block_on(engine.ask_with_k(&mut session, "What is the topic?", 0)).unwrap_err();
        assert!(matches!(err, RagError::Configuration(_)));
        assert_eq!(session.state(), QueryState::Failed);
        assert!(session.conversation().is_empty());
        assert!(generator.prompts().is_empty());
    }

    #[test]
    fn test_restore_ignores_index_from_other_model() {
        let store = Arc::new(InMemoryIndexStore::new());
        let engine = engine_with(Arc::new(ScriptedGenerator::new("ok")));
        let mut first = SessionContext::new(VectorIndex::new("ns", store.clone()));
        block_on(engine.build(&mut first, Document::new(REPORT))).unwrap();

        let other = QueryEngine::new(
            Arc::new(KeywordEmbedder::new(&["grid", "years", "prices", "capacity"])),
            Arc::new(ScriptedGenerator::new("ok")),
            settings(),
        )
        .unwrap();
        let mut second = SessionContext::new(VectorIndex::new("ns", store));
        assert!(!block_on(other.restore(&mut second, None)).unwrap());
        assert_eq!(
            block_on(other.ask(&mut second, "solar?")).unwrap_err(),
            RagError::IndexNotReady
        );
    }

    #[test]
    fn test_build_then_ask() {
        let generator = Arc::new(ScriptedGenerator::new("Expand grid storage."));
        let engine = engine_with(generator.clone());
        let mut session = session();

        let report = block_on(engine.build(&mut session, Document::new(REPORT))).unwrap();
        assert!(report.chunks >= 2);
        assert_eq!(session.document().map(|d| d.id.clone()), Some(report.document_id));

        session.conversation_mut().push_question("What is the recommendation?");
        let response =
            block_on(engine.ask(&mut session, "What is the recommendation?")).unwrap();
        assert_eq!(response.answer, "Expand grid storage.");
        assert!(response.sources[0].contains("recommendation"));
        assert_eq!(session.state(), QueryState::Done);

        let turns = session.conversation().turns();
        assert_eq!(turns.len(), 2);
        match &turns[1] {
            ConversationTurn::Answer { text, sources, .. } => {
                assert_eq!(text, "Expand grid storage.");
                assert_eq!(sources.len(), response.sources.len());
            }
            other => panic!("expected answer turn, got {:?}", other),
        }

        let prompts = generator.prompts();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("Question: What is the recommendation?"));
    }

    #[test]
    fn test_generation_failure_appends_nothing_and_recovers() {
        let engine = engine_with(Arc::new(FailingGenerator));
        let mut session = session();
        block_on(engine.build(&mut session, Document::new(REPORT))).unwrap();

        let err = block_on(engine.ask(&mut session, "solar?")).unwrap_err();
        assert!(matches!(err, RagError::Generation(_)));
        assert_eq!(session.state(), QueryState::Failed);
        assert!(session.conversation().is_empty());

        let err = block_on(engine.ask(&mut session, "solar?")).unwrap_err();
        assert!(matches!(err, RagError::Generation(_)));
    }

    #[test]
    fn test_empty_document_fails_build() {
        let engine = engine_with(Arc::new(ScriptedGenerator::new("x")));
        let mut session = session();
        let err = block_on(engine.build(&mut session, Document::new(""))).unwrap_err();
        assert_eq!(err, RagError::EmptyDocument);
        assert!(session.document().is_none());
    }

    #[test]
    fn test_restore_matches_document() {
        let store = Arc::new(InMemoryIndexStore::new());
        let engine = engine_with(Arc::new(ScriptedGenerator::new("ok")));
        let mut first = SessionContext::new(VectorIndex::new("ns", store.clone()));
        block_on(engine.build(&mut first, Document::new(REPORT))).unwrap();

        let mut second = SessionContext::new(VectorIndex::new("ns", store.clone()));
        assert!(!block_on(engine.restore(&mut second, Some(Document::new("other")))).unwrap());
        assert!(block_on(engine.restore(&mut second, Some(Document::new(REPORT)))).unwrap());
        assert!(block_on(engine.ask(&mut second, "solar?")).is_ok());
    }

    #[test]
    fn test_invalid_settings_rejected() {
        let embedder = Arc::new(KeywordEmbedder::new(&["a"]));
        let generator = Arc::new(ScriptedGenerator::new("x"));
        let mut bad = settings();
        bad.top_k = 0;
        assert!(QueryEngine::new(embedder.clone(), generator.clone(), bad).is_err());

        let mut bad = settings();
        bad.chunk_overlap = bad.chunk_size;
        assert!(QueryEngine::new(embedder.clone(), generator.clone(), bad).is_err());

        let mut bad = settings();
        bad.context_budget_tokens = 10;
        assert!(matches!(
            QueryEngine::new(embedder, generator, bad),
            Err(RagError::Configuration(_))
        ));
    }
}
