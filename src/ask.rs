//! `qa ask`: answer one question from the persisted index.

use anyhow::{bail, Result};

use query_assistant_core::{AskResponse, RagError};

use crate::assistant::Assistant;
use crate::config::Config;

pub async fn run_ask(config: &Config, question: &str, k: Option<usize>) -> Result<()> {
    let question = question.trim();
    if question.is_empty() {
        bail!("question must not be empty");
    }

    let assistant = Assistant::from_config(config.clone()).await?;
    let mut session = match assistant.restore_session().await? {
        Some(session) => session,
        None => {
            return Err(anyhow::Error::new(RagError::IndexNotReady).context(format!(
                "no index stored under namespace '{}'; run `qa ingest <file>` first",
                config.index.namespace
            )))
        }
    };

    let k = k.unwrap_or(assistant.engine().top_k());
    let response = assistant
        .engine()
        .ask_with_k(&mut session, question, k)
        .await?;
    print_response(&response);
    Ok(())
}

/// Print an answer followed by its numbered sources.
pub fn print_response(response: &AskResponse) {
    println!("{}", response.answer);
    if response.sources.is_empty() {
        return;
    }
    println!();
    println!("Sources:");
    for (i, source) in response.sources.iter().enumerate() {
        println!("  [{}] {}", i + 1, preview(source, 160));
    }
    if response.trimmed > 0 {
        println!(
            "  ({} lower-ranked chunk(s) left out to fit the context budget)",
            response.trimmed
        );
    }
}

/// First `max_chars` characters of `text`, with an ellipsis when cut.
pub fn preview(text: &str, max_chars: usize) -> String {
    let mut out: String = text.chars().take(max_chars).collect();
    if text.chars().count() > max_chars {
        out.push('…');
    }
    out
}
