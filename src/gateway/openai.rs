//! Adapter for OpenAI-compatible chat completion endpoints.
//!
//! Requests are always streamed: the response body is a server-sent-event
//! stream of content deltas which the adapter concatenates into one string.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};

use super::error::{ErrorContext, ProviderError};
use super::types::*;

// =============================================================================
// TRAIT
// =============================================================================

/// Trait for chat completion providers.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    async fn chat(&self, req: &ChatRequest) -> Result<ChatResponse, ProviderError>;
}

// =============================================================================
// OPENAI-COMPATIBLE ADAPTER
// =============================================================================

/// Maximum allowed response content length (4MB; metadata-laden answers run long).
const MAX_RESPONSE_LEN: usize = 4 * 1_024 * 1_024;

/// Maximum allowed input characters across all messages.
const MAX_INPUT_CHARS: usize = 2_000_000;

/// Adapter for any OpenAI-compatible `/chat/completions` endpoint.
#[derive(Debug, Clone)]
pub struct OpenAiAdapter {
    client: reqwest::Client,
    base_url: String,
}

impl OpenAiAdapter {
    /// Create with custom configuration.
    pub fn with_config(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ProviderError> {
        let api_key = api_key.into();
        let base_url = base_url.into();

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let auth_value = HeaderValue::from_str(&format!("Bearer {api_key}"))
            .map_err(|_| ProviderError::config("Invalid API key format"))?;
        headers.insert(AUTHORIZATION, auth_value);

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .gzip(true)
            .build()
            .map_err(|e| ProviderError::config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self { client, base_url })
    }

    fn chat_url(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }

    /// Extract request ID from response headers.
    fn extract_request_id(headers: &reqwest::header::HeaderMap) -> Option<String> {
        headers
            .get("x-request-id")
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string())
    }
}

// =============================================================================
// API TYPES
// =============================================================================

#[derive(Serialize)]
struct ChatApiRequest<'a> {
    model: &'a str,
    messages: &'a [ApiMessage],
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    stream: bool,
}

#[derive(Serialize)]
struct ApiMessage {
    role: String,
    content: String,
}

impl From<&Message> for ApiMessage {
    fn from(m: &Message) -> Self {
        Self {
            role: match m.role {
                Role::System => "system".to_string(),
                Role::User => "user".to_string(),
                Role::Assistant => "assistant".to_string(),
            },
            content: m.content.clone(),
        }
    }
}

#[derive(Deserialize)]
struct StreamChunk {
    choices: Option<Vec<StreamChoice>>,
    error: Option<ApiError>,
}

#[derive(Deserialize)]
struct StreamChoice {
    delta: Option<Delta>,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct Delta {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: Option<ApiError>,
}

#[derive(Deserialize)]
struct ApiError {
    message: Option<String>,
    code: Option<serde_json::Value>,
}

impl ApiError {
    fn code_string(&self) -> Option<String> {
        self.code.as_ref().map(|c| match c {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        })
    }
}

// =============================================================================
// SSE ACCUMULATOR
// =============================================================================

/// Incremental parser for an SSE chat-completion stream.
///
/// Feed raw body bytes as they arrive; content deltas accumulate in order.
/// Tolerates `data:` payloads split across network chunks.
struct SseAccumulator {
    buffer: String,
    content: String,
    finish_reason: Option<String>,
    done: bool,
    error: Option<String>,
}

impl SseAccumulator {
    fn new() -> Self {
        Self {
            buffer: String::new(),
            content: String::new(),
            finish_reason: None,
            done: false,
            error: None,
        }
    }

    fn push(&mut self, bytes: &[u8]) {
        self.buffer.push_str(&String::from_utf8_lossy(bytes));
        while let Some(pos) = self.buffer.find('\n') {
            let line: String = self.buffer.drain(..=pos).collect();
            self.consume_line(line.trim_end_matches(['\n', '\r']));
        }
    }

    fn consume_line(&mut self, line: &str) {
        let Some(payload) = line.strip_prefix("data:") else {
            return;
        };
        let payload = payload.trim();
        if payload == "[DONE]" {
            self.done = true;
            return;
        }
        let Ok(chunk) = serde_json::from_str::<StreamChunk>(payload) else {
            // Keep-alive comments and unparseable frames are skipped.
            return;
        };
        if let Some(err) = chunk.error {
            self.error = Some(err.message.unwrap_or_else(|| "stream error".into()));
            return;
        }
        if let Some(choice) = chunk.choices.and_then(|c| c.into_iter().next()) {
            if let Some(text) = choice.delta.and_then(|d| d.content) {
                self.content.push_str(&text);
            }
            if let Some(reason) = choice.finish_reason {
                self.finish_reason = Some(reason);
            }
        }
    }
}

// =============================================================================
// CHAT PROVIDER IMPL
// =============================================================================

#[async_trait]
impl ChatProvider for OpenAiAdapter {
    async fn chat(&self, req: &ChatRequest) -> Result<ChatResponse, ProviderError> {
        // Validate input size
        let total_chars: usize = req.messages.iter().map(|m| m.content.len()).sum();

        if total_chars > MAX_INPUT_CHARS {
            return Err(ProviderError::invalid_request(format!(
                "Input too large: {total_chars} chars (max {MAX_INPUT_CHARS})"
            )));
        }

        let start = Instant::now();

        let messages: Vec<ApiMessage> = req.messages.iter().map(ApiMessage::from).collect();

        let api_req = ChatApiRequest {
            model: &req.model,
            messages: &messages,
            temperature: req.temperature,
            max_tokens: req.max_tokens,
            stream: true,
        };

        let mut response = self
            .client
            .post(self.chat_url())
            .json(&api_req)
            .send()
            .await?;

        let status = response.status();
        let request_id = Self::extract_request_id(response.headers());

        let ctx = ErrorContext::new().with_status(status.as_u16());
        let ctx = if let Some(id) = &request_id {
            ctx.with_request_id(id)
        } else {
            ctx
        };

        if !status.is_success() {
            // Error bodies are plain JSON, not SSE.
            let body = response.text().await.unwrap_or_default();
            if let Ok(parsed) = serde_json::from_str::<ErrorBody>(&body) {
                if let Some(error) = parsed.error {
                    let message = error.message.clone().unwrap_or_default();
                    let ctx = if let Some(code) = error.code_string() {
                        ctx.with_code(code)
                    } else {
                        ctx
                    };
                    return Err(ProviderError::provider_with_context("chat", message, ctx));
                }
            }
            return Err(ProviderError::provider_with_context(
                "chat",
                format!("HTTP {}", status.as_u16()),
                ctx,
            ));
        }

        // Stream the SSE body, enforcing the response size cap.
        let mut acc = SseAccumulator::new();
        let mut total_bytes = 0usize;
        while let Some(chunk) = response.chunk().await? {
            total_bytes += chunk.len();
            if total_bytes > MAX_RESPONSE_LEN {
                return Err(ProviderError::provider(
                    "chat",
                    format!("Response too large: {total_bytes} bytes"),
                ));
            }
            acc.push(&chunk);
            if acc.done {
                break;
            }
        }

        if let Some(message) = acc.error {
            return Err(ProviderError::provider_with_context("chat", message, ctx));
        }

        let mut content = acc.content;
        if content.len() > MAX_RESPONSE_LEN {
            content.truncate(MAX_RESPONSE_LEN);
        }

        Ok(ChatResponse {
            content,
            latency: start.elapsed(),
            finish_reason: FinishReason::from(acc.finish_reason),
        })
    }
}
