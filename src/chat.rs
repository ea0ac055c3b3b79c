//! `qa chat`: ingest a document, then answer questions interactively.
//!
//! Lines starting with `/` are commands:
//!
//! | Input | Effect |
//! |-------|--------|
//! | `/clear` | clear the conversation |
//! | `/history` | print the conversation |
//! | `/examples` | list example questions |
//! | `/ask N` | ask example question `N` |
//! | `/quit` | exit |
//!
//! Anything else is asked as a question. A failed question is reported and
//! the loop continues; the failed answer is not added to the conversation.

use std::io::Write;
use std::path::Path;

use anyhow::Result;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};

use query_assistant_core::session::{ConversationTurn, SessionContext};

use crate::ask::preview;
use crate::assistant::Assistant;
use crate::config::Config;

/// Questions suggested to first-time users.
pub const EXAMPLE_QUESTIONS: &[&str] = &[
    "What are the key findings?",
    "What are the important trends discussed?",
    "What are the recommendations in the document?",
    "What is the main topic of the document?",
];

pub fn print_examples(out: &mut impl Write) -> std::io::Result<()> {
    for (i, q) in EXAMPLE_QUESTIONS.iter().enumerate() {
        writeln!(out, "  {}. {}", i + 1, q)?;
    }
    Ok(())
}

pub async fn run_chat(config: &Config, path: &Path, content_type: Option<&str>) -> Result<()> {
    let assistant = Assistant::from_config(config.clone()).await?;
    let mut session = assistant.session();
    let report = assistant
        .ingest_file(&mut session, path, content_type)
        .await?;
    println!(
        "Indexed {} ({} chunks). Ask a question, or /examples, /history, /clear, /quit.",
        path.display(),
        report.chunks
    );

    let stdin = BufReader::new(tokio::io::stdin());
    let mut stdout = std::io::stdout();
    run_chat_loop(&assistant, &mut session, stdin, &mut stdout).await
}

/// Drive the chat loop over arbitrary input and output streams.
pub async fn run_chat_loop<R, W>(
    assistant: &Assistant,
    session: &mut SessionContext,
    input: R,
    out: &mut W,
) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    let mut lines = input.lines();
    loop {
        write!(out, "> ")?;
        out.flush()?;
        let line = match lines.next_line().await? {
            Some(line) => line,
            None => break,
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let question = match line {
            "/quit" | "/exit" => break,
            "/clear" => {
                session.conversation_mut().clear();
                writeln!(out, "Chat history cleared.")?;
                continue;
            }
            "/history" => {
                print_history(session, out)?;
                continue;
            }
            "/examples" => {
                print_examples(out)?;
                continue;
            }
            cmd if cmd.starts_with("/ask ") => {
                let picked = cmd[5..]
                    .trim()
                    .parse::<usize>()
                    .ok()
                    .and_then(|n| n.checked_sub(1))
                    .and_then(|i| EXAMPLE_QUESTIONS.get(i));
                match picked {
                    Some(q) => q.to_string(),
                    None => {
                        writeln!(out, "Pick an example between 1 and {}.", EXAMPLE_QUESTIONS.len())?;
                        continue;
                    }
                }
            }
            cmd if cmd.starts_with('/') => {
                writeln!(out, "Unknown command: {}", cmd)?;
                continue;
            }
            q => q.to_string(),
        };

        session.conversation_mut().push_question(question.as_str());
        match assistant.engine().ask(session, &question).await {
            Ok(response) => {
                writeln!(out, "{}", response.answer)?;
                for (i, source) in response.sources.iter().enumerate() {
                    writeln!(out, "  [{}] {}", i + 1, preview(source, 100))?;
                }
            }
            Err(err) => writeln!(out, "Error: {}", err)?,
        }
    }
    Ok(())
}

fn print_history(session: &SessionContext, out: &mut impl Write) -> std::io::Result<()> {
    if session.conversation().is_empty() {
        return writeln!(out, "(no messages yet)");
    }
    for turn in session.conversation().turns() {
        match turn {
            ConversationTurn::Question { text, .. } => writeln!(out, "you: {}", text)?,
            ConversationTurn::Answer { text, sources, .. } => {
                writeln!(out, "assistant: {} ({} sources)", text, sources.len())?
            }
        }
    }
    Ok(())
}
