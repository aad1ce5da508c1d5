//! Inference collaborator.
//!
//! The pipeline hands a model name and a message list to an
//! [`InferenceProvider`] and gets completion text back. [`OllamaClient`]
//! implements it over Ollama's native `/api/chat` endpoint with streaming
//! disabled, so one request yields one JSON reply.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use researcher_shared::{ChatMessage, InferenceConfig, ResearcherError, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};
use url::Url;

/// User-Agent string for inference requests.
const USER_AGENT: &str = concat!("Researcher/", env!("CARGO_PKG_VERSION"));

/// Longest server error body echoed back in an error message.
const MAX_ERROR_BODY: usize = 200;

// ---------------------------------------------------------------------------
// Provider trait
// ---------------------------------------------------------------------------

/// Anything that can answer a chat transcript with a single completion.
#[async_trait]
pub trait InferenceProvider: Send + Sync {
    /// Human-readable name for logging.
    fn name(&self) -> &'static str;

    /// Generate one non-streaming completion for `messages`.
    async fn chat(&self, model: &str, messages: &[ChatMessage]) -> Result<String>;
}

// ---------------------------------------------------------------------------
// Wire types (Ollama /api/chat)
// ---------------------------------------------------------------------------

/// Request body for `POST /api/chat`.
#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
}

/// Response body for a non-streaming `POST /api/chat`.
#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: ChatMessage,
    #[serde(default)]
    prompt_eval_count: Option<u64>,
    #[serde(default)]
    eval_count: Option<u64>,
}

/// Error body Ollama returns alongside non-2xx statuses.
#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: String,
}

// ---------------------------------------------------------------------------
// Ollama backend
// ---------------------------------------------------------------------------

/// Connection settings for [`OllamaClient`].
#[derive(Debug, Clone)]
pub struct OllamaOptions {
    /// Server base URL, e.g. `http://127.0.0.1:11434`.
    pub host: String,
    /// Timeout for HTTP requests in seconds.
    pub timeout_secs: u64,
}

impl From<&InferenceConfig> for OllamaOptions {
    fn from(config: &InferenceConfig) -> Self {
        Self {
            host: config.host.clone(),
            timeout_secs: config.timeout_secs,
        }
    }
}

/// Client for a local (or remote) Ollama server.
#[derive(Debug, Clone)]
pub struct OllamaClient {
    client: Client,
    chat_url: Url,
}

impl OllamaClient {
    pub fn new(opts: &OllamaOptions) -> Result<Self> {
        // Trailing slash so `join` appends to a path prefix instead of replacing it.
        let chat_url = Url::parse(&format!("{}/", opts.host.trim_end_matches('/')))
            .and_then(|host| host.join("api/chat"))
            .map_err(|e| {
                ResearcherError::config(format!("invalid Ollama host '{}': {e}", opts.host))
            })?;

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(opts.timeout_secs))
            .build()
            .map_err(|e| {
                ResearcherError::Inference(format!("failed to build HTTP client: {e}"))
            })?;

        Ok(Self { client, chat_url })
    }

    #[cfg(test)]
    fn chat_url(&self) -> &Url {
        &self.chat_url
    }
}

#[async_trait]
impl InferenceProvider for OllamaClient {
    fn name(&self) -> &'static str {
        "ollama"
    }

    #[instrument(skip_all, fields(model = %model, messages = messages.len()))]
    async fn chat(&self, model: &str, messages: &[ChatMessage]) -> Result<String> {
        let start = Instant::now();
        let request = ChatRequest {
            model,
            messages,
            stream: false,
        };

        debug!(url = %self.chat_url, "sending chat request");

        let response = self
            .client
            .post(self.chat_url.clone())
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                ResearcherError::Inference(format!(
                    "failed to reach Ollama at {} (is `ollama serve` running?): {e}",
                    self.chat_url
                ))
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ResearcherError::Inference(format!(
                "Ollama returned HTTP {status}: {}",
                server_error_text(&body)
            )));
        }

        let reply: ChatResponse = response.json().await.map_err(|e| {
            ResearcherError::Inference(format!("Ollama returned invalid JSON: {e}"))
        })?;

        info!(
            tokens_in = reply.prompt_eval_count.unwrap_or(0),
            tokens_out = reply.eval_count.unwrap_or(0),
            latency_ms = start.elapsed().as_millis() as u64,
            "completion received"
        );

        Ok(reply.message.content)
    }
}

/// Pull the `error` field out of an Ollama error body, or fall back to the
/// (truncated) raw body.
fn server_error_text(body: &str) -> String {
    match serde_json::from_str::<ErrorResponse>(body) {
        Ok(err) => err.error,
        Err(_) => body.chars().take(MAX_ERROR_BODY).collect(),
    }
}
