//! End-to-end tests of the document → index → answer pipeline against a
//! real SQLite store, with deterministic in-process providers.

use std::sync::Arc;

use query_assistant::assistant::Assistant;
use query_assistant::chat::run_chat_loop;
use query_assistant::config::Config;
use query_assistant_core::session::{ConversationTurn, QueryState};
use query_assistant_core::testing::{FailingGenerator, KeywordEmbedder, ScriptedGenerator};
use query_assistant_core::RagError;
use tempfile::TempDir;

const REPORT: &str = "Annual report 2023.\n\n\
Revenue grew by twelve percent, driven by exports.\n\n\
Costs rose in logistics and energy.\n\n\
The board recommends expanding into new markets and cutting energy costs.";

fn test_config(tmp: &TempDir) -> Config {
    let mut config = Config::minimal();
    config.index.path = tmp.path().join("data/qa.sqlite");
    config.chunking.chunk_size = 80;
    config.chunking.chunk_overlap = 10;
    config.retrieval.top_k = 2;
    config.generation.context_budget_tokens = 60;
    config
}

fn embedder() -> Arc<KeywordEmbedder> {
    Arc::new(KeywordEmbedder::new(&[
        "revenue", "costs", "board", "recommends", "energy", "exports",
    ]))
}

async fn assistant(tmp: &TempDir, generator: Arc<ScriptedGenerator>) -> Assistant {
    Assistant::with_providers(test_config(tmp), embedder(), generator)
        .await
        .unwrap()
}

#[tokio::test]
async fn ingest_then_ask_returns_grounded_answer() {
    let tmp = TempDir::new().unwrap();
    let generator = Arc::new(ScriptedGenerator::new("Expand into new markets."));
    let assistant = assistant(&tmp, generator.clone()).await;
    let mut session = assistant.session();

    let report = assistant
        .ingest_bytes(&mut session, REPORT.as_bytes(), "text/plain")
        .await
        .unwrap();
    assert!(report.chunks >= 2);
    assert_eq!(report.pages, 1);

    let response = assistant
        .engine()
        .ask(&mut session, "What does the board recommend?")
        .await
        .unwrap();
    assert_eq!(response.answer, "Expand into new markets.");
    assert!(!response.sources.is_empty() && response.sources.len() <= 2);
    assert!(response.sources[0].contains("recommends"));

    let normalized: String = REPORT.split_whitespace().collect::<Vec<_>>().join(" ");
    for source in &response.sources {
        assert!(normalized.contains(source.as_str()));
    }

    let prompts = generator.prompts();
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].contains("Question: What does the board recommend?"));
    assert_eq!(session.state(), QueryState::Done);
}

#[tokio::test]
async fn persisted_index_survives_restart() {
    let tmp = TempDir::new().unwrap();
    {
        let assistant = assistant(&tmp, Arc::new(ScriptedGenerator::new("x"))).await;
        let mut session = assistant.session();
        assistant
            .ingest_bytes(&mut session, REPORT.as_bytes(), "text/plain")
            .await
            .unwrap();
    }

    let assistant = assistant(&tmp, Arc::new(ScriptedGenerator::new("Twelve percent."))).await;
    let mut session = assistant
        .restore_session()
        .await
        .unwrap()
        .expect("index should be restored");
    let response = assistant
        .engine()
        .ask(&mut session, "How much did revenue grow?")
        .await
        .unwrap();
    assert_eq!(response.answer, "Twelve percent.");
    assert!(response.sources[0].contains("Revenue"));
}

#[tokio::test]
async fn restore_without_ingest_finds_nothing() {
    let tmp = TempDir::new().unwrap();
    let assistant = assistant(&tmp, Arc::new(ScriptedGenerator::new("x"))).await;
    assert!(assistant.restore_session().await.unwrap().is_none());

    let mut session = assistant.session();
    let err = assistant
        .engine()
        .ask(&mut session, "What is the topic?")
        .await
        .unwrap_err();
    assert_eq!(err, RagError::IndexNotReady);
}

#[tokio::test]
async fn generation_failure_keeps_conversation_clean() {
    let tmp = TempDir::new().unwrap();
    let assistant = Assistant::with_providers(test_config(&tmp), embedder(), Arc::new(FailingGenerator))
        .await
        .unwrap();
    let mut session = assistant.session();
    assistant
        .ingest_bytes(&mut session, REPORT.as_bytes(), "text/plain")
        .await
        .unwrap();

    session.conversation_mut().push_question("What about costs?");
    let err = assistant
        .engine()
        .ask(&mut session, "What about costs?")
        .await
        .unwrap_err();
    assert!(matches!(err, RagError::Generation(_)));
    assert_eq!(session.conversation().len(), 1);
    assert!(session.conversation().turns()[0].is_question());
    assert_eq!(session.state(), QueryState::Failed);
}

#[tokio::test]
async fn chat_loop_handles_commands_and_questions() {
    let tmp = TempDir::new().unwrap();
    let assistant = assistant(&tmp, Arc::new(ScriptedGenerator::new("It is a report."))).await;
    let mut session = assistant.session();
    assistant
        .ingest_bytes(&mut session, REPORT.as_bytes(), "text/plain")
        .await
        .unwrap();

    let input: &[u8] = b"/examples\n/ask 4\n\nWhat about energy?\n/ask 9\n/bogus\n/history\n/clear\n/history\n/quit\nnever asked\n";
    let mut out = Vec::new();
    run_chat_loop(&assistant, &mut session, input, &mut out)
        .await
        .unwrap();
    let out = String::from_utf8(out).unwrap();

    assert!(out.contains("3. What are the recommendations in the document?"));
    assert_eq!(out.matches("assistant: It is a report.").count(), 2);
    assert!(out.contains("you: What is the main topic of the document?"));
    assert!(out.contains("you: What about energy?"));
    assert!(out.contains("Pick an example between 1 and 4."));
    assert!(out.contains("Unknown command: /bogus"));
    assert!(out.contains("Chat history cleared."));
    assert!(out.contains("(no messages yet)"));
    assert!(session.conversation().is_empty());
}

#[tokio::test]
async fn chat_loop_reports_errors_and_continues() {
    let tmp = TempDir::new().unwrap();
    let assistant = assistant(&tmp, Arc::new(ScriptedGenerator::new("unused"))).await;
    let mut session = assistant.session();

    let input: &[u8] = b"first question\nsecond question\n";
    let mut out = Vec::new();
    run_chat_loop(&assistant, &mut session, input, &mut out)
        .await
        .unwrap();
    let out = String::from_utf8(out).unwrap();

    assert_eq!(out.matches("Error: index not ready").count(), 2);
    let turns = session.conversation().turns();
    assert_eq!(turns.len(), 2);
    assert!(turns
        .iter()
        .all(|t| matches!(t, ConversationTurn::Question { .. })));
}
