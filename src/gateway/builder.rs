//! Builder for configuring gateway instances

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use super::Gateway;
use crate::cache::{CacheStore, MemoryCacheConfig, MemoryCacheStore, NoopCacheStore};
use crate::config::{CacheSettings, GatewayConfig, SamplingDefaults, TelemetrySettings};
use crate::providers::selector::log_selection;
use crate::providers::{CompletionBackend, HttpCompletionBackend, ProviderConfig, select};
use crate::telemetry::{HttpRunSink, Instrumentation, LogRunSink, RunSink};
use crate::template::PromptTemplate;
use crate::Result;

/// Builder for configuring gateway instances.
///
/// Everything has a default except the provider, which defaults to the
/// unconfigured sentinel: such a gateway builds fine and serves cache hits,
/// but every miss fails with [`GatewayError::NoProvider`](crate::GatewayError::NoProvider).
pub struct GatewayBuilder {
    provider: Option<ProviderConfig>,
    backend: Option<Arc<dyn CompletionBackend>>,
    cache: Option<Arc<dyn CacheStore>>,
    template: Option<PromptTemplate>,
    instrumentation: Instrumentation,
    sampling: SamplingDefaults,
    cache_ttl: Duration,
    backend_timeout: Duration,
}

impl GatewayBuilder {
    pub fn new() -> Self {
        let cache = CacheSettings::default();
        Self {
            provider: None,
            backend: None,
            cache: None,
            template: None,
            instrumentation: Instrumentation::new(Arc::new(LogRunSink)),
            sampling: SamplingDefaults::default(),
            cache_ttl: cache.ttl,
            backend_timeout: crate::providers::openai::DEFAULT_TIMEOUT,
        }
    }

    /// Builder preloaded from startup configuration.
    ///
    /// Selects the provider, connects the cache store, loads the prompt
    /// template and picks the run sink. An unreachable redis degrades to no
    /// caching with a warning instead of failing startup.
    pub async fn from_config(config: &GatewayConfig) -> Result<Self> {
        let provider = select(&config.providers);
        log_selection(&provider);

        let template = match &config.prompt_template {
            Some(path) => PromptTemplate::from_file(path)?,
            None => PromptTemplate::builtin()?,
        };
        info!(template = template.name(), "prompt template loaded");

        Ok(Self::new()
            .provider(provider)
            .cache_store(cache_store_for(&config.cache).await)
            .cache_ttl(config.cache.ttl)
            .template(template)
            .instrumentation(instrumentation_for(&config.telemetry)?)
            .sampling(config.sampling)
            .backend_timeout(config.backend.timeout))
    }

    /// Set the active provider.
    pub fn provider(mut self, provider: ProviderConfig) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Replace the HTTP backend (tests, custom transports).
    pub fn backend(mut self, backend: Arc<dyn CompletionBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Set the cache store. Default: in-process [`MemoryCacheStore`].
    pub fn cache_store(mut self, store: Arc<dyn CacheStore>) -> Self {
        self.cache = Some(store);
        self
    }

    /// Disable caching.
    pub fn no_cache(self) -> Self {
        self.cache_store(Arc::new(NoopCacheStore))
    }

    /// Time-to-live for entries written by this gateway.
    pub fn cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    /// Set the prompt template. Default: the built-in template.
    pub fn template(mut self, template: PromptTemplate) -> Self {
        self.template = Some(template);
        self
    }

    /// Send run records to `sink`. Default: [`LogRunSink`].
    pub fn run_sink(mut self, sink: Arc<dyn RunSink>) -> Self {
        self.instrumentation = self.instrumentation.with_sink(sink);
        self
    }

    /// Include user message, rendered prompt and response text in run records.
    pub fn record_payloads(mut self, enabled: bool) -> Self {
        self.instrumentation = self.instrumentation.with_payloads(enabled);
        self
    }

    /// Tag run records with a deployment environment.
    pub fn environment(mut self, environment: impl Into<String>) -> Self {
        self.instrumentation = self.instrumentation.with_environment(environment);
        self
    }

    pub fn instrumentation(mut self, instrumentation: Instrumentation) -> Self {
        self.instrumentation = instrumentation;
        self
    }

    /// Sampling parameters for requests that leave them unset.
    pub fn sampling(mut self, sampling: SamplingDefaults) -> Self {
        self.sampling = sampling;
        self
    }

    /// Timeout for the default HTTP backend. Ignored with a custom backend.
    pub fn backend_timeout(mut self, timeout: Duration) -> Self {
        self.backend_timeout = timeout;
        self
    }

    /// Build the gateway.
    pub fn build(self) -> Result<Gateway> {
        let provider = self.provider.unwrap_or_else(|| ProviderConfig::Unconfigured {
            reason: "no provider set on the builder".to_string(),
        });
        let backend = match self.backend {
            Some(backend) => backend,
            None => Arc::new(HttpCompletionBackend::with_timeout(self.backend_timeout)?),
        };
        let cache = self
            .cache
            .unwrap_or_else(|| Arc::new(MemoryCacheStore::default()));
        let template = match self.template {
            Some(template) => template,
            None => PromptTemplate::builtin()?,
        };

        Ok(Gateway {
            provider,
            backend,
            cache,
            template,
            instrumentation: self.instrumentation,
            sampling: self.sampling,
            cache_ttl: self.cache_ttl,
        })
    }
}

impl Default for GatewayBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl Gateway {
    /// Build a gateway from startup configuration.
    pub async fn from_config(config: &GatewayConfig) -> Result<Self> {
        GatewayBuilder::from_config(config).await?.build()
    }
}

async fn cache_store_for(settings: &CacheSettings) -> Arc<dyn CacheStore> {
    if !settings.enabled {
        info!("response cache disabled");
        return Arc::new(NoopCacheStore);
    }

    if let Some(url) = &settings.redis_url {
        #[cfg(feature = "redis")]
        {
            return match crate::cache::RedisCacheStore::connect(url).await {
                Ok(store) => Arc::new(store),
                Err(e) => {
                    warn!(error = %e, "redis unavailable, continuing without a response cache");
                    Arc::new(NoopCacheStore)
                }
            };
        }
        #[cfg(not(feature = "redis"))]
        warn!(
            url = %url,
            "REDIS_URL set but the `redis` feature is disabled, using the in-process cache"
        );
    }

    info!(max_entries = settings.max_entries, "in-process response cache");
    Arc::new(MemoryCacheStore::new(
        &MemoryCacheConfig::new().max_entries(settings.max_entries),
    ))
}

fn instrumentation_for(settings: &TelemetrySettings) -> Result<Instrumentation> {
    if !settings.enabled {
        info!("run records disabled");
        return Ok(Instrumentation::disabled());
    }
    let mut instrumentation = match &settings.sink_url {
        Some(url) => {
            info!(url = %url, "run records posted to collector");
            Instrumentation::new(Arc::new(HttpRunSink::new(url.clone())?))
        }
        None => Instrumentation::new(Arc::new(LogRunSink)),
    };
    if settings.record_payloads {
        info!("run records include message payloads");
        instrumentation = instrumentation.with_payloads(true);
    }
    if let Some(environment) = &settings.environment {
        instrumentation = instrumentation.with_environment(environment.clone());
    }
    Ok(instrumentation)
}
