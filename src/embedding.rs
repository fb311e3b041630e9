//! Embedding provider abstraction and hosted implementations.
//!
//! - **[`GeminiEmbedder`]** — Google Generative Language `batchEmbedContents` / `embedContent`.
//! - **[`OpenAIEmbedder`]** — OpenAI `POST /v1/embeddings`.
//! - **[`OllamaEmbedder`]** — a local Ollama instance's `POST /api/embed`.
//!
//! Use [`create_embedder`] to build the provider named in the configuration.
//!
//! # Retry Strategy
//!
//! All providers use exponential backoff for transient errors:
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors → retry
//! - Backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5)

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use crate::config::{read_credential, EmbeddingConfig};
use crate::error::InitError;

/// Maps text to fixed-length vectors.
///
/// Documents and queries are embedded through separate methods because
/// some models (Gemini) embed them with different task types.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Returns the model identifier (e.g. `"models/embedding-001"`).
    fn model_name(&self) -> &str;

    /// Embeds document fragments; one vector per text, in input order.
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Embeds a single search query.
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        let results = self.embed_documents(&[text.to_string()]).await?;
        results
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("Empty embedding response"))
    }
}

/// Embeds `texts` in order, `batch_size` texts per provider call.
///
/// When `expected_dims` is set every vector must have that length.
pub async fn embed_in_batches(
    embedder: &dyn Embedder,
    texts: &[String],
    batch_size: usize,
    expected_dims: Option<usize>,
) -> Result<Vec<Vec<f32>>> {
    let mut vectors = Vec::with_capacity(texts.len());
    for (n, batch) in texts.chunks(batch_size.max(1)).enumerate() {
        tracing::debug!(batch = n, size = batch.len(), "embedding batch");
        let embedded = embedder.embed_documents(batch).await?;
        if embedded.len() != batch.len() {
            bail!(
                "embedding provider returned {} vectors for {} texts",
                embedded.len(),
                batch.len()
            );
        }
        if let Some(dims) = expected_dims {
            if let Some(v) = embedded.iter().find(|v| v.len() != dims) {
                bail!("expected {}-dimensional embeddings, got {}", dims, v.len());
            }
        }
        vectors.extend(embedded);
    }
    Ok(vectors)
}

/// Create the embedder named by `embedding.provider`.
///
/// # Errors
///
/// Returns [`InitError::MissingCredential`] when the provider needs an API
/// key and its environment variable is unset or empty.
pub fn create_embedder(config: &EmbeddingConfig) -> Result<Arc<dyn Embedder>, InitError> {
    let api_key = match config.api_key_var() {
        Some(var) => Some(read_credential(&var)?),
        None => None,
    };
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()?;
    let http = RetryingClient {
        client,
        max_retries: config.max_retries,
    };

    let embedder: Arc<dyn Embedder> = match config.provider.as_str() {
        "openai" => Arc::new(OpenAIEmbedder {
            http,
            url: config.base_url(),
            model: config.model(),
            api_key: api_key.unwrap_or_default(),
        }),
        "ollama" => Arc::new(OllamaEmbedder {
            http,
            url: config.base_url(),
            model: config.model(),
        }),
        _ => Arc::new(GeminiEmbedder {
            http,
            url: config.base_url(),
            model: gemini_model_path(&config.model()),
            api_key: api_key.unwrap_or_default(),
        }),
    };
    Ok(embedder)
}

/// Gemini model ids are addressed as `models/<name>`.
pub(crate) fn gemini_model_path(model: &str) -> String {
    if model.starts_with("models/") {
        model.to_string()
    } else {
        format!("models/{}", model)
    }
}

// ============ HTTP with retry ============

struct RetryingClient {
    client: reqwest::Client,
    max_retries: u32,
}

impl RetryingClient {
    /// POSTs `body` as JSON, retrying 429/5xx and network errors.
    async fn post_json(
        &self,
        label: &str,
        url: &str,
        headers: &[(&str, String)],
        body: &serde_json::Value,
    ) -> Result<serde_json::Value> {
        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tracing::warn!(
                    provider = label,
                    attempt,
                    delay_secs = delay.as_secs(),
                    "retrying embedding request"
                );
                tokio::time::sleep(delay).await;
            }

            let mut request = self.client.post(url).json(body);
            for (name, value) in headers {
                request = request.header(*name, value);
            }

            match request.send().await {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        return Ok(response.json().await?);
                    }

                    let body_text = response.text().await.unwrap_or_default();
                    if status.as_u16() == 429 || status.is_server_error() {
                        last_err = Some(anyhow!("{} API error {}: {}", label, status, body_text));
                        continue;
                    }

                    bail!("{} API error {}: {}", label, status, body_text);
                }
                Err(e) => {
                    last_err = Some(anyhow!("{} connection error ({}): {}", label, url, e));
                    continue;
                }
            }
        }

        Err(last_err.unwrap_or_else(|| anyhow!("{} embedding failed after retries", label)))
    }
}

fn json_floats(value: &serde_json::Value, what: &str) -> Result<Vec<f32>> {
    let arr = value
        .as_array()
        .ok_or_else(|| anyhow!("Invalid embedding response: {} is not an array", what))?;
    Ok(arr
        .iter()
        .map(|v| v.as_f64().unwrap_or(0.0) as f32)
        .collect())
}

// ============ Gemini ============

/// Embedder backed by the Google Generative Language API.
///
/// Documents are embedded with task type `RETRIEVAL_DOCUMENT`, questions
/// with `RETRIEVAL_QUERY`. Authenticates with the `x-goog-api-key` header.
pub struct GeminiEmbedder {
    http: RetryingClient,
    url: String,
    /// `models/<name>`.
    model: String,
    api_key: String,
}

impl GeminiEmbedder {
    fn request(&self, text: &str, task_type: &str) -> serde_json::Value {
        serde_json::json!({
            "model": self.model,
            "content": { "parts": [{ "text": text }] },
            "taskType": task_type,
        })
    }

    fn headers(&self) -> [(&'static str, String); 1] {
        [("x-goog-api-key", self.api_key.clone())]
    }
}

#[async_trait]
impl Embedder for GeminiEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let body = serde_json::json!({
            "requests": texts
                .iter()
                .map(|t| self.request(t, "RETRIEVAL_DOCUMENT"))
                .collect::<Vec<_>>(),
        });
        let url = format!("{}/v1beta/{}:batchEmbedContents", self.url, self.model);
        let json = self
            .http
            .post_json("Gemini", &url, &self.headers(), &body)
            .await?;
        parse_gemini_batch_response(&json)
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        let body = self.request(text, "RETRIEVAL_QUERY");
        let url = format!("{}/v1beta/{}:embedContent", self.url, self.model);
        let json = self
            .http
            .post_json("Gemini", &url, &self.headers(), &body)
            .await?;
        parse_gemini_single_response(&json)
    }
}

/// Extracts `embeddings[].values` from a `batchEmbedContents` response.
fn parse_gemini_batch_response(json: &serde_json::Value) -> Result<Vec<Vec<f32>>> {
    let embeddings = json
        .get("embeddings")
        .and_then(|e| e.as_array())
        .ok_or_else(|| anyhow!("Invalid Gemini response: missing embeddings array"))?;

    embeddings
        .iter()
        .map(|e| {
            let values = e
                .get("values")
                .ok_or_else(|| anyhow!("Invalid Gemini response: missing values"))?;
            json_floats(values, "values")
        })
        .collect()
}

/// Extracts `embedding.values` from an `embedContent` response.
fn parse_gemini_single_response(json: &serde_json::Value) -> Result<Vec<f32>> {
    let values = json
        .get("embedding")
        .and_then(|e| e.get("values"))
        .ok_or_else(|| anyhow!("Invalid Gemini response: missing embedding.values"))?;
    json_floats(values, "embedding.values")
}

// ============ OpenAI ============

/// Embedder backed by the OpenAI embeddings API (bearer auth).
pub struct OpenAIEmbedder {
    http: RetryingClient,
    url: String,
    model: String,
    api_key: String,
}

#[async_trait]
impl Embedder for OpenAIEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
        });
        let url = format!("{}/v1/embeddings", self.url);
        let headers = [("Authorization", format!("Bearer {}", self.api_key))];
        let json = self.http.post_json("OpenAI", &url, &headers, &body).await?;
        parse_openai_response(&json)
    }
}

/// Parse the OpenAI embeddings response, ordered by each item's `index`.
fn parse_openai_response(json: &serde_json::Value) -> Result<Vec<Vec<f32>>> {
    let data = json
        .get("data")
        .and_then(|d| d.as_array())
        .ok_or_else(|| anyhow!("Invalid OpenAI response: missing data array"))?;

    let mut indexed = Vec::with_capacity(data.len());
    for (pos, item) in data.iter().enumerate() {
        let embedding = item
            .get("embedding")
            .ok_or_else(|| anyhow!("Invalid OpenAI response: missing embedding"))?;
        let index = item
            .get("index")
            .and_then(|i| i.as_u64())
            .map(|i| i as usize)
            .unwrap_or(pos);
        indexed.push((index, json_floats(embedding, "embedding")?));
    }
    indexed.sort_by_key(|(index, _)| *index);

    Ok(indexed.into_iter().map(|(_, v)| v).collect())
}

// ============ Ollama ============

/// Embedder backed by a local Ollama instance (no credential).
pub struct OllamaEmbedder {
    http: RetryingClient,
    url: String,
    model: String,
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
        });
        let url = format!("{}/api/embed", self.url);
        let json = self.http.post_json("Ollama", &url, &[], &body).await?;
        parse_ollama_response(&json)
    }
}

fn parse_ollama_response(json: &serde_json::Value) -> Result<Vec<Vec<f32>>> {
    let embeddings = json
        .get("embeddings")
        .and_then(|e| e.as_array())
        .ok_or_else(|| anyhow!("Invalid Ollama response: missing embeddings array"))?;

    embeddings
        .iter()
        .map(|e| json_floats(e, "embedding"))
        .collect()
}
