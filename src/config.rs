//! TOML configuration.
//!
//! Every section has defaults, so an empty file (or no file at all) yields a
//! working configuration that reads `THE_KHYBER_PAKHTUNKHWA_POLICE_ACT_2017.pdf`
//! from the working directory and talks to Gemini with `GOOGLE_API_KEY`.
//!
//! ```toml
//! [document]
//! path = "docs/handbook.pdf"
//!
//! [retrieval]
//! top_k = 3
//!
//! [embedding]
//! provider = "gemini"          # gemini | openai | ollama
//! model = "models/embedding-001"
//!
//! [generation]
//! provider = "gemini"
//! model = "models/gemini-1.5-pro"
//!
//! [server]
//! bind = "127.0.0.1:8501"
//! ```

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::error::InitError;
use crate::prompt::{CONTEXT_PLACEHOLDER, DEFAULT_TEMPLATE, QUESTION_PLACEHOLDER};

/// Hosted providers understood by both the embedder and the generator.
pub const PROVIDERS: &[&str] = &["gemini", "openai", "ollama"];

/// Most requests Gemini accepts in one `batchEmbedContents` call.
pub const GEMINI_MAX_BATCH: usize = 100;

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub document: DocumentConfig,
    pub chunking: ChunkingConfig,
    pub retrieval: RetrievalConfig,
    pub embedding: EmbeddingConfig,
    pub generation: GenerationConfig,
    pub prompt: PromptConfig,
    pub ui: UiConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DocumentConfig {
    #[serde(default = "default_document_path")]
    pub path: PathBuf,
}

impl Default for DocumentConfig {
    fn default() -> Self {
        Self {
            path: default_document_path(),
        }
    }
}

fn default_document_path() -> PathBuf {
    PathBuf::from("THE_KHYBER_PAKHTUNKHWA_POLICE_ACT_2017.pdf")
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_tokens: default_max_tokens(),
        }
    }
}

fn default_max_tokens() -> usize {
    700
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// Candidates scoring below this cosine similarity are dropped.
    #[serde(default)]
    pub min_score: Option<f32>,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            min_score: None,
        }
    }
}

fn default_top_k() -> usize {
    3
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    /// Expected dimensionality; checked against the first batch when set.
    #[serde(default)]
    pub dims: Option<usize>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub api_key_env: Option<String>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_embed_retries")]
    pub max_retries: u32,
    #[serde(default = "default_embed_timeout")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            dims: None,
            url: None,
            api_key_env: None,
            batch_size: default_batch_size(),
            max_retries: default_embed_retries(),
            timeout_secs: default_embed_timeout(),
        }
    }
}

impl EmbeddingConfig {
    pub fn model(&self) -> String {
        self.model.clone().unwrap_or_else(|| {
            match self.provider.as_str() {
                "openai" => "text-embedding-3-small",
                "ollama" => "nomic-embed-text",
                _ => "models/embedding-001",
            }
            .to_string()
        })
    }

    pub fn base_url(&self) -> String {
        base_url_for(&self.provider, self.url.as_deref())
    }

    pub fn api_key_var(&self) -> Option<String> {
        api_key_var_for(&self.provider, self.api_key_env.as_deref())
    }
}

fn default_provider() -> String {
    "gemini".to_string()
}
fn default_batch_size() -> usize {
    64
}
fn default_embed_retries() -> u32 {
    5
}
fn default_embed_timeout() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct GenerationConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub api_key_env: Option<String>,
    #[serde(default)]
    pub temperature: Option<f32>,
    /// Extra attempts after an `Unavailable` failure. Zero means one call per question.
    #[serde(default)]
    pub max_retries: u32,
    #[serde(default = "default_generation_timeout")]
    pub timeout_secs: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            url: None,
            api_key_env: None,
            temperature: None,
            max_retries: 0,
            timeout_secs: default_generation_timeout(),
        }
    }
}

impl GenerationConfig {
    pub fn model(&self) -> String {
        self.model.clone().unwrap_or_else(|| {
            match self.provider.as_str() {
                "openai" => "gpt-4o-mini",
                "ollama" => "llama3.1",
                _ => "models/gemini-1.5-pro",
            }
            .to_string()
        })
    }

    pub fn base_url(&self) -> String {
        base_url_for(&self.provider, self.url.as_deref())
    }

    pub fn api_key_var(&self) -> Option<String> {
        api_key_var_for(&self.provider, self.api_key_env.as_deref())
    }
}

fn default_generation_timeout() -> u64 {
    120
}

fn base_url_for(provider: &str, configured: Option<&str>) -> String {
    let url = configured.unwrap_or(match provider {
        "openai" => "https://api.openai.com",
        "ollama" => "http://localhost:11434",
        _ => "https://generativelanguage.googleapis.com",
    });
    url.trim_end_matches('/').to_string()
}

fn api_key_var_for(provider: &str, configured: Option<&str>) -> Option<String> {
    if let Some(var) = configured {
        return Some(var.to_string());
    }
    match provider {
        "gemini" => Some("GOOGLE_API_KEY".to_string()),
        "openai" => Some("OPENAI_API_KEY".to_string()),
        _ => None,
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct PromptConfig {
    #[serde(default = "default_template")]
    pub template: String,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            template: default_template(),
        }
    }
}

fn default_template() -> String {
    DEFAULT_TEMPLATE.to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct UiConfig {
    #[serde(default = "default_title")]
    pub title: String,
    #[serde(default = "default_subtitle")]
    pub subtitle: String,
    #[serde(default = "default_wrap_width")]
    pub wrap_width: usize,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            title: default_title(),
            subtitle: default_subtitle(),
            wrap_width: default_wrap_width(),
        }
    }
}

fn default_title() -> String {
    "KPK Police Act 2017 Chatbot".to_string()
}
fn default_subtitle() -> String {
    "Ask me anything related to the Act.".to_string()
}
fn default_wrap_width() -> usize {
    90
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
    "127.0.0.1:8501".to_string()
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        if self.chunking.max_tokens == 0 {
            anyhow::bail!("chunking.max_tokens must be > 0");
        }

        if self.retrieval.top_k == 0 {
            anyhow::bail!("retrieval.top_k must be >= 1");
        }
        if let Some(min) = self.retrieval.min_score {
            if !(-1.0..=1.0).contains(&min) {
                anyhow::bail!("retrieval.min_score must be in [-1.0, 1.0]");
            }
        }

        if self.embedding.batch_size == 0 {
            anyhow::bail!("embedding.batch_size must be > 0");
        }
        if self.embedding.provider == "gemini" && self.embedding.batch_size > GEMINI_MAX_BATCH {
            anyhow::bail!(
                "embedding.batch_size must be <= {} for the gemini provider",
                GEMINI_MAX_BATCH
            );
        }
        if self.embedding.dims == Some(0) {
            anyhow::bail!("embedding.dims must be > 0 when set");
        }

        for (section, provider) in [
            ("embedding", &self.embedding.provider),
            ("generation", &self.generation.provider),
        ] {
            if !PROVIDERS.contains(&provider.as_str()) {
                anyhow::bail!(
                    "Unknown {} provider: '{}'. Must be gemini, openai, or ollama.",
                    section,
                    provider
                );
            }
        }

        if let Some(t) = self.generation.temperature {
            if !(0.0..=2.0).contains(&t) {
                anyhow::bail!("generation.temperature must be in [0.0, 2.0]");
            }
        }

        for placeholder in [CONTEXT_PLACEHOLDER, QUESTION_PLACEHOLDER] {
            if !self.prompt.template.contains(placeholder) {
                anyhow::bail!("prompt.template must contain {}", placeholder);
            }
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

/// Loads `path` when it exists, otherwise falls back to the built-in defaults.
pub fn load_config_or_default(path: &Path) -> Result<Config> {
    if path.exists() {
        return load_config(path);
    }
    tracing::debug!(path = %path.display(), "no config file, using defaults");
    let config = Config::default();
    config.validate()?;
    Ok(config)
}

/// Reads a credential from the environment. Unset and empty are both missing.
pub fn read_credential(var: &str) -> std::result::Result<String, InitError> {
    match std::env::var(var) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(InitError::MissingCredential {
            var: var.to_string(),
        }),
    }
}
