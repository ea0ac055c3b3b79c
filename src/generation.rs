//! Language-generation backends for the core [`Generator`] trait.
//!
//! - **[`DisabledGenerator`]**: fails every call.
//! - **[`OpenAIGenerator`]**: `POST /v1/chat/completions`, reading
//!   `choices[0].message.content`.
//! - **[`OllamaGenerator`]**: `POST /api/chat` with `stream: false`, reading
//!   `message.content`.
//!
//! The prompt is sent as a single user message. Generation is never retried
//! here; every failure, including timeouts, is [`RagError::Generation`].

use std::sync::Arc;

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde_json::{json, Value};

use query_assistant_core::generation::Generator;
use query_assistant_core::RagError;

use crate::config::GenerationConfig;
use crate::http::JsonClient;

const OPENAI_DEFAULT_URL: &str = "https://api.openai.com";
const OLLAMA_DEFAULT_URL: &str = "http://localhost:11434";

/// Build the generator named by `config.provider`.
pub fn create_generator(config: &GenerationConfig) -> Result<Arc<dyn Generator>> {
    match config.provider.as_str() {
        "disabled" => Ok(Arc::new(DisabledGenerator)),
        "openai" => {
            let api_key = std::env::var("OPENAI_API_KEY")
                .map_err(|_| anyhow::anyhow!("OPENAI_API_KEY environment variable not set"))?;
            Ok(Arc::new(OpenAIGenerator::new(config, api_key)?))
        }
        "ollama" => Ok(Arc::new(OllamaGenerator::new(config)?)),
        other => bail!("Unknown generation provider: {}", other),
    }
}

fn generation_err(message: impl Into<String>) -> RagError {
    RagError::Generation(message.into())
}

fn chat_body(model: &str, prompt: &str, temperature: Option<f32>) -> Value {
    let mut body = json!({
        "model": model,
        "messages": [{"role": "user", "content": prompt}],
        "stream": false,
    });
    if let (Some(t), Some(obj)) = (temperature, body.as_object_mut()) {
        obj.insert("temperature".to_string(), json!(t));
    }
    body
}

pub struct DisabledGenerator;

#[async_trait]
impl Generator for DisabledGenerator {
    fn model_name(&self) -> &str {
        "disabled"
    }

    async fn generate(&self, _prompt: &str) -> query_assistant_core::Result<String> {
        Err(generation_err(
            "generation provider is disabled; set [generation].provider in the config",
        ))
    }
}

pub struct OpenAIGenerator {
    http: JsonClient,
    url: String,
    api_key: String,
    model: String,
    temperature: Option<f32>,
}

impl OpenAIGenerator {
    pub fn new(config: &GenerationConfig, api_key: String) -> Result<Self> {
        let base = config.url.as_deref().unwrap_or(OPENAI_DEFAULT_URL);
        Ok(Self {
            http: JsonClient::new("OpenAI", config.timeout_secs, 0)?,
            url: format!("{}/v1/chat/completions", base.trim_end_matches('/')),
            api_key,
            model: config.model.clone(),
            temperature: config.temperature,
        })
    }
}

#[async_trait]
impl Generator for OpenAIGenerator {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str) -> query_assistant_core::Result<String> {
        let body = chat_body(&self.model, prompt, self.temperature);
        let payload = self
            .http
            .post(&self.url, Some(&self.api_key), &body)
            .await
            .map_err(generation_err)?;
        payload["choices"][0]["message"]["content"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| generation_err("Invalid OpenAI response: missing choices[0].message.content"))
    }
}

pub struct OllamaGenerator {
    http: JsonClient,
    url: String,
    model: String,
    temperature: Option<f32>,
}

impl OllamaGenerator {
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        let base = config.url.as_deref().unwrap_or(OLLAMA_DEFAULT_URL);
        Ok(Self {
            http: JsonClient::new("Ollama", config.timeout_secs, 0)?,
            url: format!("{}/api/chat", base.trim_end_matches('/')),
            model: config.model.clone(),
            temperature: config.temperature,
        })
    }
}

#[async_trait]
impl Generator for OllamaGenerator {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str) -> query_assistant_core::Result<String> {
        let body = chat_body(&self.model, prompt, self.temperature);
        let payload = self
            .http
            .post(&self.url, None, &body)
            .await
            .map_err(generation_err)?;
        payload["message"]["content"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| generation_err("Invalid Ollama response: missing message.content"))
    }
}
