//! Embedding provider implementations.
//!
//! Concrete backends for the core [`EmbeddingProvider`] trait:
//! - **[`DisabledEmbedder`]**: fails every call; used when `embedding.provider = "disabled"`.
//! - **[`OpenAIEmbedder`]**: `POST /v1/embeddings` on the OpenAI API (or any
//!   compatible server set via `embedding.url`).
//! - **[`OllamaEmbedder`]**: `POST /api/embed` on a local Ollama instance.
//!
//! Batching is done by the vector index (`embedding.batch_size` texts per
//! call). Timeouts, HTTP failures and malformed responses all surface as
//! [`RagError::ProviderUnavailable`].
//!
//! ```rust
//! # use query_assistant::config::EmbeddingConfig;
//! # use query_assistant::embedding::create_embedder;
//! let config = EmbeddingConfig::default(); // provider = "disabled"
//! let provider = create_embedder(&config).unwrap();
//! assert_eq!(provider.model_name(), "disabled");
//! ```

use std::sync::Arc;

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde_json::Value;

use query_assistant_core::embedding::EmbeddingProvider;
use query_assistant_core::RagError;

use crate::config::EmbeddingConfig;
use crate::http::JsonClient;

const OPENAI_DEFAULT_URL: &str = "https://api.openai.com";
const OLLAMA_DEFAULT_URL: &str = "http://localhost:11434";

/// Build the provider named by `config.provider`.
///
/// # Errors
///
/// Unknown provider names, missing `model`/`dims`, or a missing
/// `OPENAI_API_KEY` for the `openai` provider.
pub fn create_embedder(config: &EmbeddingConfig) -> Result<Arc<dyn EmbeddingProvider>> {
    match config.provider.as_str() {
        "disabled" => Ok(Arc::new(DisabledEmbedder)),
        "openai" => {
            let api_key = std::env::var("OPENAI_API_KEY")
                .map_err(|_| anyhow::anyhow!("OPENAI_API_KEY environment variable not set"))?;
            Ok(Arc::new(OpenAIEmbedder::new(config, api_key)?))
        }
        "ollama" => Ok(Arc::new(OllamaEmbedder::new(config)?)),
        other => bail!("Unknown embedding provider: {}", other),
    }
}

fn required_model_and_dims(config: &EmbeddingConfig, who: &str) -> Result<(String, usize)> {
    let model = config
        .model
        .clone()
        .ok_or_else(|| anyhow::anyhow!("embedding.model required for {} provider", who))?;
    let dims = config
        .dims
        .filter(|d| *d > 0)
        .ok_or_else(|| anyhow::anyhow!("embedding.dims required for {} provider", who))?;
    Ok((model, dims))
}

fn unavailable(message: impl Into<String>) -> RagError {
    RagError::ProviderUnavailable(message.into())
}

// ============ Disabled ============

/// Provider that refuses every request.
pub struct DisabledEmbedder;

#[async_trait]
impl EmbeddingProvider for DisabledEmbedder {
    fn model_name(&self) -> &str {
        "disabled"
    }

    fn dims(&self) -> usize {
        0
    }

    async fn embed_batch(&self, _texts: &[String]) -> query_assistant_core::Result<Vec<Vec<f32>>> {
        Err(unavailable(
            "embedding provider is disabled; set [embedding].provider in the config",
        ))
    }
}

// ============ OpenAI ============

pub struct OpenAIEmbedder {
    http: JsonClient,
    url: String,
    api_key: String,
    model: String,
    dims: usize,
}

impl OpenAIEmbedder {
    pub fn new(config: &EmbeddingConfig, api_key: String) -> Result<Self> {
        let (model, dims) = required_model_and_dims(config, "OpenAI")?;
        let base = config.url.as_deref().unwrap_or(OPENAI_DEFAULT_URL);
        Ok(Self {
            http: JsonClient::new("OpenAI", config.timeout_secs, config.max_retries)?,
            url: format!("{}/v1/embeddings", base.trim_end_matches('/')),
            api_key,
            model,
            dims,
        })
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAIEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed_batch(&self, texts: &[String]) -> query_assistant_core::Result<Vec<Vec<f32>>> {
        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
        });
        let json = self
            .http
            .post(&self.url, Some(&self.api_key), &body)
            .await
            .map_err(unavailable)?;
        parse_openai_response(&json)
    }
}

/// Extract `data[].embedding`, ordered by each item's `index`.
fn parse_openai_response(json: &Value) -> query_assistant_core::Result<Vec<Vec<f32>>> {
    let data = json
        .get("data")
        .and_then(|d| d.as_array())
        .ok_or_else(|| unavailable("Invalid OpenAI response: missing data array"))?;

    let mut indexed = Vec::with_capacity(data.len());
    for (position, item) in data.iter().enumerate() {
        let embedding = item
            .get("embedding")
            .ok_or_else(|| unavailable("Invalid OpenAI response: missing embedding"))?;
        let index = item
            .get("index")
            .and_then(|i| i.as_u64())
            .map(|i| i as usize)
            .unwrap_or(position);
        indexed.push((index, number_array(embedding, "OpenAI")?));
    }
    indexed.sort_by_key(|(i, _)| *i);
    Ok(indexed.into_iter().map(|(_, v)| v).collect())
}

fn number_array(value: &Value, who: &str) -> query_assistant_core::Result<Vec<f32>> {
    value
        .as_array()
        .ok_or_else(|| unavailable(format!("Invalid {} response: embedding is not an array", who)))?
        .iter()
        .map(|v| {
            v.as_f64()
                .map(|f| f as f32)
                .ok_or_else(|| unavailable(format!("Invalid {} response: non-numeric value", who)))
        })
        .collect()
}

// ============ Ollama ============

pub struct OllamaEmbedder {
    http: JsonClient,
    url: String,
    model: String,
    dims: usize,
}

impl OllamaEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let (model, dims) = required_model_and_dims(config, "Ollama")?;
        let base = config.url.as_deref().unwrap_or(OLLAMA_DEFAULT_URL);
        Ok(Self {
            http: JsonClient::new("Ollama", config.timeout_secs, config.max_retries)?,
            url: format!("{}/api/embed", base.trim_end_matches('/')),
            model,
            dims,
        })
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed_batch(&self, texts: &[String]) -> query_assistant_core::Result<Vec<Vec<f32>>> {
        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
        });
        let json = self.http.post(&self.url, None, &body).await.map_err(unavailable)?;
        parse_ollama_response(&json)
    }
}

fn parse_ollama_response(json: &Value) -> query_assistant_core::Result<Vec<Vec<f32>>> {
    json.get("embeddings")
        .and_then(|e| e.as_array())
        .ok_or_else(|| unavailable("Invalid Ollama response: missing embeddings array"))?
        .iter()
        .map(|e| number_array(e, "Ollama"))
        .collect()
}
