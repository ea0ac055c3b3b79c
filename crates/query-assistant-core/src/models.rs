//! Core data models used throughout Query Assistant.
//!
//! These types represent the document, chunks, index entries, and search
//! hits that flow through the build and query phases of the pipeline.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Extracted, normalized text of one uploaded file.
///
/// The `id` is the SHA-256 of the text, so re-uploading the same content
/// maps to the same document scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub id: String,
    pub text: String,
}

impl Document {
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        let mut hasher = Sha256::new();
        hasher.update(text.as_bytes());
        Self {
            id: format!("{:x}", hasher.finalize()),
            text,
        }
    }

    /// Length in characters (not bytes).
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

/// A contiguous segment of a [`Document`].
///
/// `start` and `end` are character offsets into the document text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: i64,
    pub start: usize,
    pub end: usize,
    pub text: String,
}

impl Chunk {
    pub fn char_len(&self) -> usize {
        self.end - self.start
    }
}

/// One stored (id, vector, text) triple of a vector index.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexEntry {
    pub chunk_id: i64,
    pub text: String,
    pub vector: Vec<f32>,
}

/// A chunk returned from a similarity search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub chunk_id: i64,
    pub text: String,
    /// Cosine similarity in `[-1.0, 1.0]`.
    pub score: f32,
}
