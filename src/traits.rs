//! Core ChatGateway trait

use async_trait::async_trait;

use crate::{ChatRequest, ChatResponse, Gateway, Result};

/// The one operation a transport needs.
///
/// HTTP handlers, queue consumers and the CLI depend on this rather than on
/// [`Gateway`] so they can be exercised against a stub.
#[async_trait]
pub trait ChatGateway: Send + Sync {
    /// Answer one chat request.
    async fn handle(&self, request: &ChatRequest) -> Result<ChatResponse>;
}

#[async_trait]
impl ChatGateway for Gateway {
    async fn handle(&self, request: &ChatRequest) -> Result<ChatResponse> {
        Gateway::handle(self, request).await
    }
}
