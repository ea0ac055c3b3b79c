//! Deterministic in-process providers for tests.
//!
//! Compiled for this crate's unit tests and, with the `testing` feature,
//! for downstream integration tests. None of these perform I/O.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::generation::Generator;

/// Embeds text as term counts over a fixed vocabulary.
///
/// The model name includes the vocabulary, so two embedders with different
/// vocabularies count as different models. The last dimension is a small
/// constant so no text maps to the zero vector. Two texts sharing
/// vocabulary words score higher than unrelated ones, which is all
/// retrieval tests need.
pub struct KeywordEmbedder {
    model: String,
    vocab: Vec<String>,
    calls: AtomicUsize,
}

impl KeywordEmbedder {
    pub fn new(vocab: &[&str]) -> Self {
        let vocab: Vec<String> = vocab.iter().map(|w| w.to_lowercase()).collect();
        Self {
            model: format!("keyword-test:{}", vocab.join(",")),
            vocab,
            calls: AtomicUsize::new(0),
        }
    }

    /// Number of `embed_batch` calls made so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn vectorize(&self, text: &str) -> Vec<f32> {
        let lower = text.to_lowercase();
        let words: Vec<&str> = lower
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .collect();
        let mut v: Vec<f32> = self
            .vocab
            .iter()
            .map(|term| words.iter().filter(|w| *w == term).count() as f32)
            .collect();
        v.push(0.01);
        v
    }
}

#[async_trait]
impl EmbeddingProvider for KeywordEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dims(&self) -> usize {
        self.vocab.len() + 1
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(texts.iter().map(|t| self.vectorize(t)).collect())
    }
}

/// Returns preset vectors for known texts and fails on anything else.
pub struct TableEmbedder {
    dims: usize,
    table: HashMap<String, Vec<f32>>,
}

impl TableEmbedder {
    pub fn new(dims: usize, entries: Vec<(String, Vec<f32>)>) -> Self {
        Self {
            dims,
            table: entries.into_iter().collect(),
        }
    }
}

#[async_trait]
impl EmbeddingProvider for TableEmbedder {
    fn model_name(&self) -> &str {
        "table-test"
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        texts
            .iter()
            .map(|t| {
                self.table
                    .get(t)
                    .cloned()
                    .ok_or_else(|| RagError::ProviderUnavailable(format!("no vector for {:?}", t)))
            })
            .collect()
    }
}

/// Always fails with [`RagError::ProviderUnavailable`].
pub struct FailingEmbedder;

#[async_trait]
impl EmbeddingProvider for FailingEmbedder {
    fn model_name(&self) -> &str {
        "failing-test"
    }

    fn dims(&self) -> usize {
        3
    }

    async fn embed_batch(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Err(RagError::ProviderUnavailable("quota exceeded".to_string()))
    }
}

/// Returns a fixed reply and records every prompt it receives.
pub struct ScriptedGenerator {
    reply: String,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedGenerator {
    pub fn new(reply: impl Into<String>) -> Self {
        Self {
            reply: reply.into(),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Prompts received so far, in call order.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Generator for ScriptedGenerator {
    fn model_name(&self) -> &str {
        "scripted-test"
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.to_string());
        }
        Ok(self.reply.clone())
    }
}

/// Always fails with [`RagError::Generation`].
pub struct FailingGenerator;

#[async_trait]
impl Generator for FailingGenerator {
    fn model_name(&self) -> &str {
        "failing-test"
    }

    async fn generate(&self, _prompt: &str) -> Result<String> {
        Err(RagError::Generation("model overloaded".to_string()))
    }
}
