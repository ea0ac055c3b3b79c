//! # Query Assistant
//!
//! Ask natural-language questions about an uploaded document and get
//! answers grounded in its text (retrieval-augmented generation).
//!
//! The pipeline itself (chunking, vector index, retrieval, prompt assembly,
//! session state machine) lives in [`query_assistant_core`]. This crate
//! adds everything that touches the outside world.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//! │  extract     │──▶│ core engine  │──▶│ SQLite store │
//! │ PDF/OOXML/txt│   │ chunk+index  │   │ (namespaced) │
//! └──────────────┘   └──────┬───────┘   └──────────────┘
//!                           │ embed / generate
//!                    ┌──────┴───────┐
//!                    │ OpenAI/Ollama│
//!                    └──────────────┘
//!           ┌──────────┐       ┌──────────┐
//!           │   CLI    │       │   HTTP   │
//!           │  (qa)    │       │  (axum)  │
//!           └──────────┘       └──────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing and validation |
//! | [`logging`] | `tracing` subscriber setup |
//! | [`extract`] | Document bytes → normalized text |
//! | [`embedding`] | OpenAI / Ollama embedding backends |
//! | [`generation`] | OpenAI / Ollama chat backends |
//! | [`sqlite_store`] | Persisted vector indexes |
//! | [`assistant`] | Config → engine wiring, ingestion |
//! | [`ingest`], [`ask`], [`chat`] | CLI commands |
//! | [`server`] | HTTP API |
//! | [`db`], [`migrate`] | Database connection and schema |

pub mod ask;
pub mod assistant;
pub mod chat;
pub mod config;
pub mod db;
pub mod embedding;
pub mod extract;
pub mod generation;
mod http;
pub mod ingest;
pub mod logging;
pub mod migrate;
pub mod server;
pub mod sqlite_store;
