//! Mocks shared by the integration tests.
#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use llmops_gateway::cache::{CacheEntry, CacheKey, CacheStore, MemoryCacheStore};
use llmops_gateway::providers::{
    ApiKey, AzureConfig, Completion, CompletionBackend, CompletionRequest, OpenAiConfig,
    ProviderConfig,
};
use llmops_gateway::telemetry::MemoryRunSink;
use llmops_gateway::{Gateway, GatewayError, Result, Usage};

// ============================================================================
// Backends
// ============================================================================

/// Backend that answers with a fixed text and counts calls.
pub struct StubBackend {
    reply: String,
    fail: bool,
    delay: Option<Duration>,
    calls: AtomicUsize,
    last: Mutex<Option<CompletionRequest>>,
}

impl StubBackend {
    pub fn replying(reply: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: reply.to_string(),
            fail: false,
            delay: None,
            calls: AtomicUsize::new(0),
            last: Mutex::new(None),
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            reply: String::new(),
            fail: true,
            delay: None,
            calls: AtomicUsize::new(0),
            last: Mutex::new(None),
        })
    }

    pub fn slow(reply: &str, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            reply: reply.to_string(),
            fail: false,
            delay: Some(delay),
            calls: AtomicUsize::new(0),
            last: Mutex::new(None),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> Option<CompletionRequest> {
        self.last.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionBackend for StubBackend {
    fn name(&self) -> &str {
        "stub"
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<Completion> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last.lock().unwrap() = Some(request.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail {
            return Err(GatewayError::Api {
                status: 500,
                message: "upstream exploded".to_string(),
            });
        }
        Ok(Completion {
            content: self.reply.clone(),
            usage: Some(Usage::new(12, 1)),
            ..Default::default()
        })
    }
}

/// Backend that echoes the last outbound message back.
pub struct EchoBackend;

#[async_trait]
impl CompletionBackend for EchoBackend {
    fn name(&self) -> &str {
        "echo"
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<Completion> {
        let last = request
            .messages
            .last()
            .map(|m| m.content.clone())
            .unwrap_or_default();
        Ok(Completion {
            content: last,
            ..Default::default()
        })
    }
}

// ============================================================================
// Cache stores
// ============================================================================

/// In-memory store that counts operations and can be told to fail.
#[derive(Default)]
pub struct CountingStore {
    inner: MemoryCacheStore,
    pub fail_get: AtomicBool,
    pub fail_set: AtomicBool,
    gets: AtomicUsize,
    sets: AtomicUsize,
}

impl CountingStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing_get() -> Arc<Self> {
        let store = Self::default();
        store.fail_get.store(true, Ordering::SeqCst);
        Arc::new(store)
    }

    pub fn failing_set() -> Arc<Self> {
        let store = Self::default();
        store.fail_set.store(true, Ordering::SeqCst);
        Arc::new(store)
    }

    pub fn gets(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    pub fn sets(&self) -> usize {
        self.sets.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CacheStore for CountingStore {
    fn name(&self) -> &str {
        "counting"
    }

    async fn get(&self, key: &CacheKey) -> Result<Option<CacheEntry>> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        if self.fail_get.load(Ordering::SeqCst) {
            return Err(GatewayError::CacheUnavailable("connection refused".into()));
        }
        self.inner.get(key).await
    }

    async fn set(&self, key: &CacheKey, entry: CacheEntry, ttl: Duration) -> Result<()> {
        self.sets.fetch_add(1, Ordering::SeqCst);
        if self.fail_set.load(Ordering::SeqCst) {
            return Err(GatewayError::CacheUnavailable("connection refused".into()));
        }
        self.inner.set(key, entry, ttl).await
    }

    async fn ping(&self) -> Result<()> {
        if self.fail_get.load(Ordering::SeqCst) {
            return Err(GatewayError::CacheUnavailable("connection refused".into()));
        }
        Ok(())
    }
}

// ============================================================================
// Providers and gateways
// ============================================================================

pub fn openai_provider() -> ProviderConfig {
    ProviderConfig::OpenAi(OpenAiConfig {
        api_key: ApiKey::new("sk-test"),
        model: "gpt-4o-mini".to_string(),
        base_url: "https://api.openai.com/v1".to_string(),
    })
}

pub fn azure_provider() -> ProviderConfig {
    ProviderConfig::Azure(AzureConfig {
        api_key: ApiKey::new("az-test"),
        endpoint: "https://example.openai.azure.com".to_string(),
        api_version: "2024-02-15-preview".to_string(),
        deployment: "gpt-4o-mini".to_string(),
    })
}

pub fn unconfigured() -> ProviderConfig {
    ProviderConfig::Unconfigured {
        reason: "no credentials".to_string(),
    }
}

/// Gateway wired to the given mocks.
pub fn gateway(
    provider: ProviderConfig,
    backend: Arc<dyn CompletionBackend>,
    store: Arc<dyn CacheStore>,
    sink: Arc<MemoryRunSink>,
) -> Gateway {
    Gateway::builder()
        .provider(provider)
        .backend(backend)
        .cache_store(store)
        .run_sink(sink)
        .build()
        .unwrap()
}
