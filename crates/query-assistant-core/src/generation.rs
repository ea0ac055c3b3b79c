//! Language-generation capability consumed by the answer generator.

use async_trait::async_trait;

use crate::error::Result;

/// Produces text from a prompt.
///
/// Called exactly once per question. Implementations report every failure,
/// including timeouts, as [`RagError::Generation`](crate::error::RagError::Generation).
#[async_trait]
pub trait Generator: Send + Sync {
    /// Returns the model identifier (e.g. `"gpt-3.5-turbo"`).
    fn model_name(&self) -> &str;

    /// Generate a completion for `prompt`.
    async fn generate(&self, prompt: &str) -> Result<String>;
}
