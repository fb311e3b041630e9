//! Answer generation against a hosted chat model.
//!
//! Each call returns a typed [`GenerationError`] so callers can tell an
//! unreachable service from a refused request or an unusable reply.
//!
//! | Provider | Endpoint |
//! |----------|----------|
//! | `gemini` | `POST /v1beta/{model}:generateContent` |
//! | `openai` | `POST /v1/chat/completions` |
//! | `ollama` | `POST /api/chat` |

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::config::{read_credential, GenerationConfig};
use crate::embedding::gemini_model_path;
use crate::error::InitError;

#[derive(Error, Debug)]
pub enum GenerationError {
    /// Network failure, timeout, HTTP 429 or 5xx.
    #[error("generation service unavailable: {0}")]
    Unavailable(String),
    /// Any other non-success status.
    #[error("generation request rejected ({status}): {message}")]
    Rejected { status: u16, message: String },
    #[error("malformed generation response: {0}")]
    Malformed(String),
    #[error("model returned an empty answer")]
    Empty,
}

impl GenerationError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, GenerationError::Unavailable(_))
    }
}

/// Produces free text from a prompt.
#[async_trait]
pub trait Generator: Send + Sync {
    fn model_name(&self) -> &str;

    /// One generation attempt. Returns non-blank text or an error.
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError>;
}

/// Calls `generator`, retrying only [`GenerationError::Unavailable`] up to
/// `max_retries` extra times with exponential backoff.
pub async fn generate_with_retry(
    generator: &dyn Generator,
    prompt: &str,
    max_retries: u32,
) -> Result<String, GenerationError> {
    let mut attempt = 0;
    loop {
        match generator.generate(prompt).await {
            Err(e) if e.is_retryable() && attempt < max_retries => {
                attempt += 1;
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tracing::warn!(
                    model = generator.model_name(),
                    attempt,
                    delay_secs = delay.as_secs(),
                    error = %e,
                    "retrying generation"
                );
                tokio::time::sleep(delay).await;
            }
            other => return other,
        }
    }
}

/// Create the generator named by `generation.provider`.
pub fn create_generator(config: &GenerationConfig) -> Result<Arc<dyn Generator>, InitError> {
    let api_key = match config.api_key_var() {
        Some(var) => Some(read_credential(&var)?),
        None => None,
    };
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()?;

    let generator: Arc<dyn Generator> = match config.provider.as_str() {
        "openai" => Arc::new(OpenAIGenerator {
            client,
            url: config.base_url(),
            model: config.model(),
            api_key: api_key.unwrap_or_default(),
            temperature: config.temperature,
        }),
        "ollama" => Arc::new(OllamaGenerator {
            client,
            url: config.base_url(),
            model: config.model(),
            temperature: config.temperature,
        }),
        _ => Arc::new(GeminiGenerator {
            client,
            url: config.base_url(),
            model: gemini_model_path(&config.model()),
            api_key: api_key.unwrap_or_default(),
            temperature: config.temperature,
        }),
    };
    Ok(generator)
}

/// Sends the request and maps transport/status failures onto [`GenerationError`].
async fn send(request: reqwest::RequestBuilder) -> Result<serde_json::Value, GenerationError> {
    let response = request
        .send()
        .await
        .map_err(|e| GenerationError::Unavailable(e.to_string()))?;
    let status = response.status();

    if status.is_success() {
        return response
            .json()
            .await
            .map_err(|e| GenerationError::Malformed(e.to_string()));
    }

    let body_text = response.text().await.unwrap_or_default();
    if status.as_u16() == 429 || status.is_server_error() {
        Err(GenerationError::Unavailable(format!(
            "HTTP {}: {}",
            status, body_text
        )))
    } else {
        Err(GenerationError::Rejected {
            status: status.as_u16(),
            message: body_text,
        })
    }
}

fn non_empty(text: String) -> Result<String, GenerationError> {
    if text.trim().is_empty() {
        Err(GenerationError::Empty)
    } else {
        Ok(text)
    }
}

// ============ Gemini ============

pub struct GeminiGenerator {
    client: reqwest::Client,
    url: String,
    model: String,
    api_key: String,
    temperature: Option<f32>,
}

#[async_trait]
impl Generator for GeminiGenerator {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        let mut body = serde_json::json!({
            "contents": [{ "role": "user", "parts": [{ "text": prompt }] }],
        });
        if let Some(t) = self.temperature {
            body["generationConfig"] = serde_json::json!({ "temperature": t });
        }
        let request = self
            .client
            .post(format!("{}/v1beta/{}:generateContent", self.url, self.model))
            .header("x-goog-api-key", &self.api_key)
            .json(&body);
        let json = send(request).await?;
        non_empty(parse_gemini_response(&json)?)
    }
}

/// Concatenates the text parts of the first candidate.
///
/// A response without candidates but with `promptFeedback.blockReason` was
/// refused by the safety filter and is reported as rejected.
fn parse_gemini_response(json: &serde_json::Value) -> Result<String, GenerationError> {
    let candidates = json.get("candidates").and_then(|c| c.as_array());
    let first = match candidates.and_then(|c| c.first()) {
        Some(first) => first,
        None => {
            if let Some(reason) = json
                .get("promptFeedback")
                .and_then(|f| f.get("blockReason"))
                .and_then(|r| r.as_str())
            {
                return Err(GenerationError::Rejected {
                    status: 200,
                    message: format!("prompt blocked: {}", reason),
                });
            }
            return Err(GenerationError::Malformed(
                "missing candidates array".to_string(),
            ));
        }
    };

    let parts = first
        .get("content")
        .and_then(|c| c.get("parts"))
        .and_then(|p| p.as_array())
        .ok_or_else(|| GenerationError::Malformed("missing content.parts".to_string()))?;

    Ok(parts
        .iter()
        .filter_map(|p| p.get("text").and_then(|t| t.as_str()))
        .collect::<Vec<_>>()
        .join(""))
}

// ============ OpenAI ============

pub struct OpenAIGenerator {
    client: reqwest::Client,
    url: String,
    model: String,
    api_key: String,
    temperature: Option<f32>,
}

#[async_trait]
impl Generator for OpenAIGenerator {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        let mut body = serde_json::json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": prompt }],
        });
        if let Some(t) = self.temperature {
            body["temperature"] = serde_json::json!(t);
        }
        let request = self
            .client
            .post(format!("{}/v1/chat/completions", self.url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body);
        let json = send(request).await?;
        non_empty(parse_openai_response(&json)?)
    }
}

fn parse_openai_response(json: &serde_json::Value) -> Result<String, GenerationError> {
    json.get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .map(str::to_string)
        .ok_or_else(|| GenerationError::Malformed("missing choices[0].message.content".to_string()))
}

// ============ Ollama ============

pub struct OllamaGenerator {
    client: reqwest::Client,
    url: String,
    model: String,
    temperature: Option<f32>,
}

#[async_trait]
impl Generator for OllamaGenerator {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        let mut body = serde_json::json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": prompt }],
            "stream": false,
        });
        if let Some(t) = self.temperature {
            body["options"] = serde_json::json!({ "temperature": t });
        }
        let request = self
            .client
            .post(format!("{}/api/chat", self.url))
            .json(&body);
        let json = send(request).await?;
        non_empty(parse_ollama_response(&json)?)
    }
}

fn parse_ollama_response(json: &serde_json::Value) -> Result<String, GenerationError> {
    json.get("message")
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .map(str::to_string)
        .ok_or_else(|| GenerationError::Malformed("missing message.content".to_string()))
}
