//! TOML configuration for the `qa` binary and HTTP server.
//!
//! Every section except `[embedding]` and `[generation]` is required in a
//! config file; those two default to the `disabled` provider. Use
//! [`Config::minimal`] for in-process defaults when no file exists.

use anyhow::{Context, Result};
use query_assistant_core::EngineSettings;
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub index: IndexConfig,
    pub chunking: ChunkingConfig,
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct IndexConfig {
    pub path: PathBuf,
    #[serde(default = "default_namespace")]
    pub namespace: String,
}

fn default_namespace() -> String {
    "uploaded_pdf".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
}

fn default_chunk_size() -> usize {
    500
}
fn default_chunk_overlap() -> usize {
    50
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

fn default_top_k() -> usize {
    5
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default)]
    pub max_retries: u32,
    #[serde(default = "default_embed_timeout_secs")]
    pub timeout_secs: u64,
    /// Base URL override (OpenAI-compatible endpoint or Ollama host).
    #[serde(default)]
    pub url: Option<String>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "disabled".to_string(),
            model: None,
            dims: None,
            batch_size: 64,
            max_retries: 0,
            timeout_secs: 30,
            url: None,
        }
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_batch_size() -> usize {
    64
}
fn default_embed_timeout_secs() -> u64 {
    30
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct GenerationConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_generation_model")]
    pub model: String,
    #[serde(default = "default_context_budget")]
    pub context_budget_tokens: usize,
    #[serde(default = "default_generation_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub url: Option<String>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            provider: "disabled".to_string(),
            model: default_generation_model(),
            context_budget_tokens: default_context_budget(),
            timeout_secs: default_generation_timeout_secs(),
            temperature: None,
            url: None,
        }
    }
}

fn default_generation_model() -> String {
    "gpt-3.5-turbo".to_string()
}
fn default_context_budget() -> usize {
    3000
}
fn default_generation_timeout_secs() -> u64 {
    60
}

impl GenerationConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:7341".to_string()
}

impl Config {
    /// Defaults with both providers disabled and the index under `./data`.
    pub fn minimal() -> Self {
        Self {
            index: IndexConfig {
                path: PathBuf::from("./data/qa.sqlite"),
                namespace: default_namespace(),
            },
            chunking: ChunkingConfig {
                chunk_size: default_chunk_size(),
                chunk_overlap: default_chunk_overlap(),
            },
            retrieval: RetrievalConfig {
                top_k: default_top_k(),
            },
            embedding: EmbeddingConfig::default(),
            generation: GenerationConfig::default(),
            server: ServerConfig::default(),
        }
    }

    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            chunk_size: self.chunking.chunk_size,
            chunk_overlap: self.chunking.chunk_overlap,
            top_k: self.retrieval.top_k,
            context_budget_tokens: self.generation.context_budget_tokens,
        }
    }

    /// Check cross-field constraints. Called by [`load_config`].
    pub fn validate(&self) -> Result<()> {
        if self.chunking.chunk_size == 0 {
            anyhow::bail!("chunking.chunk_size must be > 0");
        }
        if self.chunking.chunk_overlap >= self.chunking.chunk_size {
            anyhow::bail!(
                "chunking.chunk_overlap ({}) must be smaller than chunking.chunk_size ({})",
                self.chunking.chunk_overlap,
                self.chunking.chunk_size
            );
        }
        if self.retrieval.top_k < 1 {
            anyhow::bail!("retrieval.top_k must be >= 1");
        }
        if self.generation.context_budget_tokens == 0 {
            anyhow::bail!("generation.context_budget_tokens must be > 0");
        }
        let budget_chars = self
            .generation
            .context_budget_tokens
            .saturating_mul(query_assistant_core::answer::CHARS_PER_TOKEN);
        if self.chunking.chunk_size > budget_chars {
            anyhow::bail!(
                "chunking.chunk_size ({}) exceeds the generation context budget ({} chars)",
                self.chunking.chunk_size,
                budget_chars
            );
        }
        if self.index.namespace.trim().is_empty() {
            anyhow::bail!("index.namespace must not be empty");
        }

        match self.embedding.provider.as_str() {
            "disabled" | "openai" | "ollama" => {}
            other => anyhow::bail!(
                "Unknown embedding provider: '{}'. Must be disabled, openai, or ollama.",
                other
            ),
        }
        if self.embedding.is_enabled() {
            if self.embedding.dims.is_none() || self.embedding.dims == Some(0) {
                anyhow::bail!(
                    "embedding.dims must be > 0 when provider is '{}'",
                    self.embedding.provider
                );
            }
            if self.embedding.model.is_none() {
                anyhow::bail!(
                    "embedding.model must be specified when provider is '{}'",
                    self.embedding.provider
                );
            }
        }
        if self.embedding.batch_size == 0 {
            anyhow::bail!("embedding.batch_size must be > 0");
        }

        match self.generation.provider.as_str() {
            "disabled" | "openai" | "ollama" => {}
            other => anyhow::bail!(
                "Unknown generation provider: '{}'. Must be disabled, openai, or ollama.",
                other
            ),
        }
        if self.generation.is_enabled() && self.generation.model.trim().is_empty() {
            anyhow::bail!(
                "generation.model must be specified when provider is '{}'",
                self.generation.provider
            );
        }

        Ok(())
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    config.validate()?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(toml_text: &str) -> Result<Config> {
        let config: Config = toml::from_str(toml_text)?;
        config.validate()?;
        Ok(config)
    }

    const BASE: &str = r#"
[index]
path = "./data/qa.sqlite"

[chunking]
chunk_size = 500
chunk_overlap = 50

[retrieval]
top_k = 5
"#;

    #[test]
    fn test_defaults_fill_optional_sections() {
        let config = parse(BASE).unwrap();
        assert_eq!(config.index.namespace, "uploaded_pdf");
        assert!(!config.embedding.is_enabled());
        assert_eq!(config.embedding.max_retries, 0);
        assert_eq!(config.generation.model, "gpt-3.5-turbo");
        assert_eq!(config.generation.context_budget_tokens, 3000);
        assert_eq!(config.server.bind, "127.0.0.1:7341");
    }

    #[test]
    fn test_overlap_must_be_smaller_than_size() {
        let text = BASE.replace("chunk_overlap = 50", "chunk_overlap = 500");
        let err = parse(&text).unwrap_err().to_string();
        assert!(err.contains("chunk_overlap"));
    }

    #[test]
    fn test_chunk_must_fit_context_budget() {
        let text = format!("{}\n[generation]\ncontext_budget_tokens = 100\n", BASE);
        let err = parse(&text).unwrap_err().to_string();
        assert!(err.contains("context budget"));
    }

    #[test]
    fn test_enabled_embedding_requires_dims() {
        let text = format!(
            "{}\n[embedding]\nprovider = \"openai\"\nmodel = \"text-embedding-3-small\"\n",
            BASE
        );
        let err = parse(&text).unwrap_err().to_string();
        assert!(err.contains("embedding.dims"));
    }

    #[test]
    fn test_unknown_generation_provider_rejected() {
        let text = format!("{}\n[generation]\nprovider = \"anthropic-ish\"\n", BASE);
        assert!(parse(&text).is_err());
    }

    #[test]
    fn test_minimal_is_valid() {
        let config = Config::minimal();
        assert!(config.validate().is_ok());
        assert_eq!(config.engine_settings(), EngineSettings::default());
    }

    #[test]
    fn test_example_config_loads() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("config/qa.example.toml");
        let config = load_config(&path).unwrap();
        assert_eq!(config.embedding.provider, "openai");
        assert_eq!(config.embedding.dims, Some(1536));
        assert!(config.generation.is_enabled());
    }

    #[test]
    fn test_huge_context_budget_does_not_overflow() {
        let text = format!(
            "{}\n[generation]\ncontext_budget_tokens = {}\n",
            BASE,
            i64::MAX
        );
        let config = parse(&text).unwrap();
        assert_eq!(config.generation.context_budget_tokens, i64::MAX as usize);
    }
}
