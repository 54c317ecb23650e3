//! Backend capability trait.
//!
//! The gateway never talks to an LLM API directly; it hands a fully resolved
//! [`CompletionRequest`] to a [`CompletionBackend`]. The shipped
//! implementation is [`HttpCompletionBackend`](super::HttpCompletionBackend);
//! tests and embedders can plug in their own.
//!
//! # Contract
//!
//! - One call, one attempt. Retries, if any, live inside the backend or in an
//!   outer layer, never in the gateway.
//! - Timeouts are the backend's job and surface as
//!   [`GatewayError::Timeout`](crate::GatewayError::Timeout).
//! - Every error returned should classify as
//!   [`ErrorKind::Backend`](crate::ErrorKind::Backend).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::config::CallTarget;
use crate::Result;
use crate::types::{FinishReason, Message, Usage};

/// Everything needed for one outbound completion.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub target: CallTarget,
    pub messages: Vec<Message>,
    pub temperature: f32,
    pub max_tokens: u32,
}

/// Backend answer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Completion {
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
    #[serde(default)]
    pub finish_reason: FinishReason,
    /// Model reported by the backend, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

/// Something that can complete a chat.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    /// Backend name for logging/debugging.
    fn name(&self) -> &str;

    /// Perform a single completion.
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion>;
}
