//! llmops-gateway - caching, instrumented front door for LLM chat backends
//!
//! A [`Gateway`] takes a [`ChatRequest`], answers it from the response cache
//! when it can, and otherwise renders a prompt template, calls the one
//! active provider (Azure OpenAI or OpenAI), caches the answer and returns
//! it. Every request runs under `tracing` spans, updates `metrics` counters
//! and ends with exactly one [`RunRecord`](telemetry::RunRecord) handed to
//! the configured sink.
//!
//! # Example
//!
//! ```rust,no_run
//! use llmops_gateway::{ChatRequest, Gateway, GatewayConfig, Message};
//!
//! #[tokio::main]
//! async fn main() -> llmops_gateway::Result<()> {
//!     // AZURE_OPENAI_KEY + AZURE_OPENAI_ENDPOINT, or OPENAI_API_KEY
//!     let config = GatewayConfig::from_env()?;
//!     let gateway = Gateway::from_config(&config).await?;
//!
//!     let request = ChatRequest::new(vec![Message::user("What is 2+2?")])
//!         .temperature(0.3)
//!         .metadata("department", "finance");
//!
//!     let response = gateway.handle(&request).await?;
//!     println!("{} (cache hit: {})", response.content, response.cache_hit);
//!     Ok(())
//! }
//! ```
//!
//! # Wiring by hand
//!
//! ```rust
//! use std::sync::Arc;
//! use llmops_gateway::cache::MemoryCacheStore;
//! use llmops_gateway::telemetry::MemoryRunSink;
//! use llmops_gateway::Gateway;
//!
//! let gateway = Gateway::builder()
//!     .cache_store(Arc::new(MemoryCacheStore::default()))
//!     .run_sink(Arc::new(MemoryRunSink::new()))
//!     .build()
//!     .unwrap();
//! assert!(!gateway.provider().is_configured());
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod gateway;
pub mod providers;
pub mod telemetry;
pub mod template;
pub mod traits;
pub mod types;

// Re-export main types at crate root
pub use config::GatewayConfig;
pub use error::{ErrorKind, GatewayError, Result};
pub use gateway::{Gateway, GatewayBuilder, HealthReport};
pub use traits::ChatGateway;

pub use types::{ChatRequest, ChatResponse, FinishReason, Message, Role, Usage};
