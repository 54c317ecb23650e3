//! OpenAI-compatible chat completions client.
//!
//! Speaks both dialects the selector can produce: Azure OpenAI (deployment
//! in the URL, `api-key` header) and OpenAI proper (model in the body, bearer
//! token). The dialect is already baked into the [`CallTarget`](super::CallTarget)
//! by the time a request reaches this client.
//!
//! See: <https://platform.openai.com/docs/api-reference/chat/create>

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::traits::{Completion, CompletionBackend, CompletionRequest};
use crate::types::{FinishReason, Message, Usage};
use crate::{GatewayError, Result};

/// Default per-call timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// HTTP backend for OpenAI-style `/chat/completions` endpoints.
#[derive(Clone)]
pub struct HttpCompletionBackend {
    http: Client,
}

impl HttpCompletionBackend {
    /// Create a backend with the default timeout.
    pub fn new() -> Result<Self> {
        Self::with_timeout(DEFAULT_TIMEOUT)
    }

    /// Create a backend whose calls fail with `Timeout` after `timeout`.
    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GatewayError::Configuration(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { http })
    }

    /// Wrap an existing client (shared connection pool).
    pub fn with_client(http: Client) -> Self {
        Self { http }
    }

    /// Map non-2xx statuses to gateway errors.
    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let retry_after = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok())
            .map(Duration::from_secs);
        let body = response.text().await.unwrap_or_default();

        Err(match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => GatewayError::AuthenticationFailed,
            StatusCode::TOO_MANY_REQUESTS => GatewayError::RateLimited { retry_after },
            _ => GatewayError::Api {
                status: status.as_u16(),
                message: error_message(&body),
            },
        })
    }
}

#[async_trait]
impl CompletionBackend for HttpCompletionBackend {
    fn name(&self) -> &str {
        "openai-http"
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<Completion> {
        let target = &request.target;
        let (header, value) = target.auth.header();
        let body = ChatCompletionBody {
            model: target.model_in_body.then_some(target.model.as_str()),
            messages: &request.messages,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        };

        debug!(provider = %target.provider, model = %target.model, "sending chat completion");

        let response = self
            .http
            .post(&target.url)
            .header(header, value)
            .json(&body)
            .send()
            .await?;

        let response = Self::check_status(response).await?;

        let parsed: ChatCompletionResponse = response.json().await?;

        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or(GatewayError::EmptyResponse)?;
        let content = choice.message.content.ok_or(GatewayError::EmptyResponse)?;

        Ok(Completion {
            content,
            usage: parsed.usage.map(|u| Usage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
                total_tokens: u.total_tokens,
            }),
            finish_reason: choice
                .finish_reason
                .as_deref()
                .map(FinishReason::from_wire)
                .unwrap_or_default(),
            model: parsed.model,
        })
    }
}

/// Pull `error.message` out of an OpenAI error body, else the raw body.
fn error_message(body: &str) -> String {
    serde_json::from_str::<ErrorBody>(body)
        .map(|e| e.error.message)
        .unwrap_or_else(|_| body.to_string())
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Serialize)]
struct ChatCompletionBody<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<&'a str>,
    messages: &'a [Message],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<WireUsage>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct WireUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}
