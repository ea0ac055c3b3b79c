//! Per-session state threaded through every pipeline call.
//!
//! A [`SessionContext`] holds the active document, its vector index, the
//! conversation log, and the [`QueryState`] of the current or last query.
//! Nothing here is global: callers own one context per user session and
//! pass it by `&mut` into [`QueryEngine`](crate::engine::QueryEngine), which
//! also serializes queries within the session.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::index::VectorIndex;
use crate::models::{Document, SearchHit};

/// Stage of the query pipeline.
///
/// ```text
/// Idle → Embedding → Retrieving → Generating → Done
///            │            │            │
///            └────────────┴────────────┴──▶ Failed
/// Done → Idle, Failed → Idle (on the next query)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryState {
    Idle,
    Embedding,
    Retrieving,
    Generating,
    Done,
    Failed,
}

impl QueryState {
    /// Whether moving from `self` to `next` is a legal transition.
    pub fn can_transition_to(self, next: QueryState) -> bool {
        use QueryState::*;
        matches!(
            (self, next),
            (Idle, Embedding)
                | (Embedding, Retrieving)
                | (Retrieving, Generating)
                | (Generating, Done)
                | (Embedding | Retrieving | Generating, Failed)
                | (Done | Failed, Idle)
        )
    }

    /// `true` for `Done` and `Failed`.
    pub fn is_terminal(self) -> bool {
        matches!(self, QueryState::Done | QueryState::Failed)
    }
}

/// One entry of the conversation log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum ConversationTurn {
    Question {
        text: String,
        at: DateTime<Utc>,
    },
    Answer {
        text: String,
        sources: Vec<SearchHit>,
        at: DateTime<Utc>,
    },
}

impl ConversationTurn {
    pub fn text(&self) -> &str {
        match self {
            ConversationTurn::Question { text, .. } | ConversationTurn::Answer { text, .. } => text,
        }
    }

    pub fn is_question(&self) -> bool {
        matches!(self, ConversationTurn::Question { .. })
    }
}

/// Append-only, chronological log of turns. Only [`clear`](Self::clear)
/// removes entries.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    turns: Vec<ConversationTurn>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_question(&mut self, text: impl Into<String>) {
        self.turns.push(ConversationTurn::Question {
            text: text.into(),
            at: Utc::now(),
        });
    }

    pub fn push_answer(&mut self, text: impl Into<String>, sources: Vec<SearchHit>) {
        self.turns.push(ConversationTurn::Answer {
            text: text.into(),
            sources,
            at: Utc::now(),
        });
    }

    pub fn turns(&self) -> &[ConversationTurn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn clear(&mut self) {
        self.turns.clear();
    }
}

/// Everything the pipeline knows about one user session.
pub struct SessionContext {
    id: Uuid,
    document: Option<Document>,
    index: VectorIndex,
    conversation: Conversation,
    state: QueryState,
}

impl SessionContext {
    /// New session with a random id.
    pub fn new(index: VectorIndex) -> Self {
        Self::with_id(Uuid::new_v4(), index)
    }

    pub fn with_id(id: Uuid, index: VectorIndex) -> Self {
        Self {
            id,
            document: None,
            index,
            conversation: Conversation::new(),
            state: QueryState::Idle,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// The active document, if one has been indexed.
    pub fn document(&self) -> Option<&Document> {
        self.document.as_ref()
    }

    pub fn index(&self) -> &VectorIndex {
        &self.index
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn conversation_mut(&mut self) -> &mut Conversation {
        &mut self.conversation
    }

    pub fn state(&self) -> QueryState {
        self.state
    }

    pub(crate) fn set_document(&mut self, document: Option<Document>) {
        self.document = document;
    }

    /// Move to `next`, logging the transition. Illegal transitions are
    /// logged and still applied so the session never gets stuck.
    pub(crate) fn transition(&mut self, next: QueryState) {
        if !self.state.can_transition_to(next) {
            tracing::warn!(
                session = %self.id,
                from = ?self.state,
                to = ?next,
                "unexpected query state transition"
            );
        }
        tracing::debug!(session = %self.id, from = ?self.state, to = ?next, "query state");
        self.state = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::InMemoryIndexStore;
    use std::sync::Arc;

    #[test]
    fn test_happy_path_transitions() {
        use QueryState::*;
        let path = [Idle, Embedding, Retrieving, Generating, Done, Idle];
        for pair in path.windows(2) {
            assert!(pair[0].can_transition_to(pair[1]), "{:?}", pair);
        }
    }

    #[test]
    fn test_failure_only_returns_to_idle() {
        use QueryState::*;
        for stage in [Embedding, Retrieving, Generating] {
            assert!(stage.can_transition_to(Failed));
        }
        assert!(Failed.can_transition_to(Idle));
        for next in [Embedding, Retrieving, Generating, Done] {
            assert!(!Failed.can_transition_to(next));
        }
        assert!(!Idle.can_transition_to(Failed));
        assert!(!Idle.can_transition_to(Generating));
    }

    #[test]
    fn test_conversation_is_chronological() {
        let mut conv = Conversation::new();
        conv.push_question("What is the topic?");
        conv.push_answer("Energy storage.", vec![]);
        assert_eq!(conv.len(), 2);
        assert!(conv.turns()[0].is_question());
        assert_eq!(conv.turns()[1].text(), "Energy storage.");
        conv.clear();
        assert!(conv.is_empty());
    }

    #[test]
    fn test_turn_serializes_with_role_tag() {
        let mut conv = Conversation::new();
        conv.push_question("hi");
        let json = serde_json::to_value(&conv.turns()[0]).unwrap();
        assert_eq!(json["role"], "question");
        assert_eq!(json["text"], "hi");
    }

    #[test]
    fn test_new_session_starts_idle() {
        let index = VectorIndex::new("ns", Arc::new(InMemoryIndexStore::new()));
        let session = SessionContext::new(index);
        assert_eq!(session.state(), QueryState::Idle);
        assert!(session.document().is_none());
        assert!(session.conversation().is_empty());
    }
}
