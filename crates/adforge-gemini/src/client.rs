//! Gemini REST gateway.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::RETRY_AFTER;
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{CompletionError, CompletionResult};
use crate::gateway::CompletionGateway;
use crate::types::{CompletionRequest, GenerateContentRequest, GenerateContentResponse};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_MODEL: &str = "gemini-2.5-flash";
const DEFAULT_TIMEOUT_SECS: u64 = 120;
const DEFAULT_MAX_REQUEST_BYTES: usize = 20 * 1024 * 1024;

/// Configuration for the Gemini gateway.
#[derive(Clone)]
pub struct GatewayConfig {
    pub api_key: String,
    /// Model id, e.g. `gemini-2.5-flash`
    pub model: String,
    pub base_url: String,
    /// Request timeout
    pub timeout: Duration,
    /// Serialized request ceiling; larger requests fail before sending
    pub max_request_bytes: usize,
}

impl std::fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("api_key", &"***")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .field("max_request_bytes", &self.max_request_bytes)
            .finish()
    }
}

impl GatewayConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            max_request_bytes: DEFAULT_MAX_REQUEST_BYTES,
        }
    }

    /// Create config from environment variables.
    pub fn from_env() -> CompletionResult<Self> {
        let api_key = std::env::var("GEMINI_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| CompletionError::Config("GEMINI_API_KEY not set".to_string()))?;

        let mut config = Self::new(api_key);
        if let Ok(model) = std::env::var("GEMINI_MODEL_ID") {
            config.model = model;
        }
        if let Ok(base_url) = std::env::var("GEMINI_BASE_URL") {
            config.base_url = base_url.trim_end_matches('/').to_string();
        }
        config.timeout = Duration::from_secs(
            std::env::var("GEMINI_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_TIMEOUT_SECS),
        );
        config.max_request_bytes = std::env::var("GEMINI_MAX_REQUEST_BYTES")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_MAX_REQUEST_BYTES);

        Ok(config)
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_max_request_bytes(mut self, max: usize) -> Self {
        self.max_request_bytes = max;
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }
}

/// Completion gateway backed by Gemini `generateContent`.
pub struct GeminiGateway {
    http: Client,
    config: GatewayConfig,
}

impl GeminiGateway {
    pub fn new(config: GatewayConfig) -> CompletionResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| CompletionError::Config(format!("HTTP client: {}", e)))?;

        Ok(Self { http, config })
    }

    pub fn from_env() -> CompletionResult<Self> {
        Self::new(GatewayConfig::from_env()?)
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }
}

#[async_trait]
impl CompletionGateway for GeminiGateway {
    async fn complete(&self, request: CompletionRequest) -> CompletionResult<Value> {
        let body = serde_json::to_vec(&GenerateContentRequest::from_request(&request))
            .map_err(|e| CompletionError::Config(format!("request encoding: {}", e)))?;

        if body.len() > self.config.max_request_bytes {
            return Err(CompletionError::PayloadTooLarge(format!(
                "{} bytes exceeds limit of {} ({} media parts)",
                body.len(),
                self.config.max_request_bytes,
                request.media_part_count()
            )));
        }

        debug!(
            model = %self.config.model,
            bytes = body.len(),
            media_parts = request.media_part_count(),
            "Sending completion request"
        );

        let response = self
            .http
            .post(self.config.endpoint())
            .header("x-goog-api-key", &self.config.api_key)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(|e| CompletionError::transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map(Duration::from_secs);
            let text = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "Gemini API returned an error");
            return Err(CompletionError::from_http_status(
                status.as_u16(),
                &text,
                retry_after,
            ));
        }

        let text = response
            .text()
            .await
            .map_err(|e| CompletionError::transport(e.to_string()))?;

        let envelope: GenerateContentResponse = serde_json::from_str(&text)
            .map_err(|e| CompletionError::empty_response(format!("unreadable envelope: {}", e)))?;

        parse_completion(envelope)
    }
}

/// Pull the JSON payload out of a response envelope.
fn parse_completion(envelope: GenerateContentResponse) -> CompletionResult<Value> {
    let Some(candidate) = envelope.candidates.into_iter().next() else {
        let reason = envelope
            .prompt_feedback
            .and_then(|f| f.block_reason)
            .map(|r| format!("prompt blocked: {}", r))
            .unwrap_or_else(|| "no candidates".to_string());
        return Err(CompletionError::empty_response(reason));
    };

    let text: String = candidate
        .content
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();

    if text.trim().is_empty() {
        let reason = candidate.finish_reason.unwrap_or_else(|| "UNKNOWN".to_string());
        return Err(CompletionError::empty_response(format!(
            "blank output (finish reason {})",
            reason
        )));
    }

    let value: Value = serde_json::from_str(strip_code_fence(&text))
        .map_err(|e| CompletionError::empty_response(format!("output is not JSON: {}", e)))?;

    if value.is_null() {
        return Err(CompletionError::empty_response("output is null"));
    }

    Ok(value)
}

/// Strip a surrounding markdown code fence, if any.
fn strip_code_fence(text: &str) -> &str {
    let text = text.trim();
    let text = text
        .strip_prefix("```json")
        .or_else(|| text.strip_prefix("```"))
        .unwrap_or(text);
    text.strip_suffix("```").unwrap_or(text).trim()
}
