//! # Query Assistant Core
//!
//! Retrieval-augmented question answering over a single uploaded document:
//! chunking, vector indexing, retrieval, prompt assembly with a context
//! budget, and the per-session query state machine.
//!
//! This crate contains no tokio, sqlx, HTTP clients, or filesystem I/O.
//! Embedding and generation backends plug in through the
//! [`embedding::EmbeddingProvider`] and [`generation::Generator`] traits;
//! index persistence through [`store::IndexStore`].
//!
//! ```text
//! build:  Document ─▶ Chunker ─▶ EmbeddingProvider ─▶ VectorIndex ─▶ IndexStore
//! ask:    question ─▶ retrieve ─▶ AnswerGenerator ─▶ Generator ─▶ AskResponse
//! ```

pub mod answer;
pub mod chunk;
pub mod embedding;
pub mod engine;
pub mod error;
pub mod generation;
pub mod index;
pub mod models;
pub mod retrieve;
pub mod session;
pub mod store;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use engine::{AskResponse, BuildReport, EngineSettings, QueryEngine};
pub use error::{RagError, Result};
