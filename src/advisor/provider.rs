//! Text-generation delegate: the trait the advisor orchestration talks to,
//! and the hosted-model HTTP client behind it.
//!
//! The client is constructed once at application start-up and passed into
//! `AdvisorEngine` explicitly; nothing here is process-global.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use crate::types::AdvisorConfig;

/// One prior message/response exchange, oldest first in a request history.
#[derive(Debug, Clone)]
pub struct TurnContext {
    pub message: String,
    pub response: String,
}

/// Everything the delegate needs for one turn.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub system_prompt: String,
    /// At most the five most recent prior turns, oldest first.
    pub history: Vec<TurnContext>,
    pub message: String,
}

/// Errors from the text-generation delegate.
#[derive(Debug, thiserror::Error)]
pub enum GenerateError {
    #[error("No API key configured for the advisor model")]
    NoApiKey,

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Model endpoint returned status {0}")]
    Status(u16),

    #[error("Model returned an empty response")]
    EmptyResponse,
}

/// The text-generation collaborator. Implementations must be safe to share
/// across request handlers.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerateError>;
}

// ---------------------------------------------------------------------------
// Hosted model client
// ---------------------------------------------------------------------------

/// HTTP client for the Gemini generateContent API.
pub struct GeminiClient {
    http: reqwest::Client,
    config: AdvisorConfig,
    api_key: String,
}

impl GeminiClient {
    /// Build a client from configuration. The API key comes from the config
    /// or the `GEMINI_API_KEY` environment variable.
    pub fn new(config: AdvisorConfig) -> Result<Self, GenerateError> {
        let api_key = config
            .api_key
            .clone()
            .or_else(|| std::env::var("GEMINI_API_KEY").ok())
            .filter(|key| !key.is_empty())
            .ok_or(GenerateError::NoApiKey)?;

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            http,
            config,
            api_key,
        })
    }

    fn request_body(&self, request: &GenerationRequest) -> serde_json::Value {
        let mut contents = Vec::new();
        for turn in &request.history {
            contents.push(json!({
                "role": "user",
                "parts": [{ "text": turn.message }],
            }));
            contents.push(json!({
                "role": "model",
                "parts": [{ "text": turn.response }],
            }));
        }
        contents.push(json!({
            "role": "user",
            "parts": [{ "text": format!("{}\n\nUser: {}", request.system_prompt, request.message) }],
        }));

        json!({
            "contents": contents,
            "generationConfig": {
                "temperature": self.config.temperature,
                "topP": self.config.top_p,
                "topK": self.config.top_k,
                "maxOutputTokens": self.config.max_output_tokens,
            },
        })
    }

    async fn send_once(&self, request: &GenerationRequest) -> Result<String, GenerateError> {
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.config.endpoint, self.config.model, self.api_key
        );

        let response = self
            .http
            .post(&url)
            .json(&self.request_body(request))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(GenerateError::Status(status.as_u16()));
        }

        let body: GenerateContentResponse = response.json().await?;
        let text = body
            .candidates
            .into_iter()
            .next()
            .map(|c| {
                c.content
                    .parts
                    .into_iter()
                    .filter_map(|p| p.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        let text = text.trim().to_string();
        if text.is_empty() {
            return Err(GenerateError::EmptyResponse);
        }
        Ok(text)
    }

    /// Rate limits, timeouts, and server errors are worth one more attempt;
    /// everything else is not.
    fn is_retryable(err: &GenerateError) -> bool {
        match err {
            GenerateError::Status(code) => *code == 429 || *code == 408 || *code >= 500,
            GenerateError::Http(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }
}

#[async_trait]
impl TextGenerator for GeminiClient {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerateError> {
        match self.send_once(request).await {
            Err(e) if Self::is_retryable(&e) => {
                log::warn!("Advisor model call failed ({}), retrying once", e);
                self.send_once(request).await
            }
            other => other,
        }
    }
}

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Content,
}

#[derive(Debug, Default, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    #[serde(default)]
    text: Option<String>,
}
