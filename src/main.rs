//! # Query Assistant CLI (`qa`)
//!
//! Ask questions about a document and get answers grounded in its text.
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `qa init` | Create the SQLite database and run schema migrations |
//! | `qa ingest <file>` | Extract, chunk, embed and persist a document |
//! | `qa ask "<question>"` | Answer a question from the persisted index |
//! | `qa chat <file>` | Ingest a document, then chat interactively |
//! | `qa serve` | Start the HTTP API |
//! | `qa examples` | Print example questions |
//!
//! ## Examples
//!
//! ```bash
//! qa init --config ./config/qa.toml
//! qa ingest ./report.pdf --config ./config/qa.toml
//! qa ask "What are the key findings?" --config ./config/qa.toml
//! qa serve --config ./config/qa.toml
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use query_assistant::{ask, chat, config, ingest, logging, migrate, server};

/// Query Assistant: retrieval-augmented question answering over one document.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/qa.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "qa",
    about = "Query Assistant: ask questions about a document",
    version,
    long_about = "Query Assistant splits a document into overlapping chunks, embeds them into a \
    vector index, and answers questions by retrieving the most similar chunks and passing them \
    to a language model as context."
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/qa.toml`. When the file does not exist, built-in
    /// defaults are used (both providers disabled).
    #[arg(long, global = true, default_value = "./config/qa.toml")]
    config: PathBuf,

    /// Increase log verbosity (`-v` debug, `-vv` trace). `RUST_LOG` overrides.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and the index tables. Safe to run
    /// more than once.
    Init,

    /// Index a document.
    ///
    /// Replaces whatever index is stored under `[index].namespace`.
    Ingest {
        /// Path to a PDF, DOCX, PPTX, Markdown or plain-text file.
        file: PathBuf,

        /// Content type override (e.g. `application/pdf`). Guessed from the
        /// file extension when omitted.
        #[arg(long)]
        content_type: Option<String>,
    },

    /// Answer a question from the persisted index.
    Ask {
        /// The question.
        question: String,

        /// Number of chunks to retrieve (defaults to `[retrieval].top_k`).
        #[arg(long)]
        k: Option<usize>,
    },

    /// Index a document and start an interactive chat about it.
    Chat {
        file: PathBuf,

        #[arg(long)]
        content_type: Option<String>,
    },

    /// Start the HTTP API on `[server].bind`.
    Serve,

    /// Print example questions.
    Examples,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env file is fine.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    logging::init(cli.verbose);

    if let Commands::Examples = cli.command {
        chat::print_examples(&mut std::io::stdout())?;
        return Ok(());
    }

    let cfg = if cli.config.exists() {
        config::load_config(&cli.config)?
    } else {
        tracing::warn!(
            path = %cli.config.display(),
            "config file not found; using built-in defaults"
        );
        config::Config::minimal()
    };

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Ingest { file, content_type } => {
            ingest::run_ingest(&cfg, &file, content_type.as_deref()).await?;
        }
        Commands::Ask { question, k } => {
            ask::run_ask(&cfg, &question, k).await?;
        }
        Commands::Chat { file, content_type } => {
            chat::run_chat(&cfg, &file, content_type.as_deref()).await?;
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
        Commands::Examples => {}
    }

    Ok(())
}
