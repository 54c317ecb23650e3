//! The request pipeline.
//!
//! [`Gateway::handle`] runs one request through
//! cache lookup → prompt rendering → provider resolution → backend call →
//! cache population, and emits exactly one [`RunRecord`] at the end whatever
//! the outcome. Each stage runs inside its own span under the request span.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use serde::Serialize;
use tracing::field::Empty;
use tracing::{Instrument, Span, debug, info_span, warn};
use uuid::Uuid;

use crate::cache::{CacheEntry, CacheKey, CacheStore};
use crate::config::SamplingDefaults;
use crate::providers::{CompletionBackend, CompletionRequest, ProviderConfig, ProviderKind};
use crate::telemetry::record::millis;
use crate::telemetry::{self, Instrumentation, RunRecord, spans};
use crate::template::{Bindings, PromptTemplate};
use crate::types::{ChatRequest, ChatResponse, Message};
use crate::{GatewayError, Result};

use super::builder::GatewayBuilder;

/// Caching, provider-aware front door to a chat completion backend.
///
/// Cheap to share: wrap it in an `Arc` and call [`handle`](Self::handle)
/// from as many tasks as needed. Nothing in it is mutated per request.
pub struct Gateway {
    pub(super) provider: ProviderConfig,
    pub(super) backend: Arc<dyn CompletionBackend>,
    pub(super) cache: Arc<dyn CacheStore>,
    pub(super) template: PromptTemplate,
    pub(super) instrumentation: Instrumentation,
    pub(super) sampling: SamplingDefaults,
    pub(super) cache_ttl: Duration,
}

/// Liveness summary for readiness probes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthReport {
    pub provider: ProviderKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    pub provider_configured: bool,
    pub cache_store: String,
    pub cache_ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_sink: Option<String>,
}

impl HealthReport {
    /// Ready to answer: a provider is configured and the cache answers.
    pub fn is_healthy(&self) -> bool {
        self.provider_configured && self.cache_ok
    }
}

impl Gateway {
    /// Create a new builder for configuring the gateway.
    pub fn builder() -> GatewayBuilder {
        GatewayBuilder::new()
    }

    /// The active provider, fixed for the gateway's lifetime.
    pub fn provider(&self) -> &ProviderConfig {
        &self.provider
    }

    pub fn sampling(&self) -> SamplingDefaults {
        self.sampling
    }

    pub fn cache_ttl(&self) -> Duration {
        self.cache_ttl
    }

    pub fn template(&self) -> &PromptTemplate {
        &self.template
    }

    /// Answer `request`, from the cache when possible.
    ///
    /// Errors:
    /// - [`GatewayError::InvalidRequest`] for a request without messages, with
    ///   a non-finite temperature, or with a model override the provider
    ///   cannot address.
    /// - [`GatewayError::NoProvider`] on a cache miss with no provider
    ///   configured; the backend is not called.
    /// - Backend-kind errors ([`ErrorKind::Backend`](crate::ErrorKind::Backend))
    ///   when the call fails; nothing is cached.
    ///
    /// Cache store failures never surface here: they count as a miss (on
    /// lookup) or a skipped write (on store).
    pub async fn handle(&self, request: &ChatRequest) -> Result<ChatResponse> {
        let trace_id = Uuid::new_v4().to_string();
        let span = info_span!(
            spans::REQUEST,
            trace_id = %trace_id,
            provider = %self.provider.kind(),
            department = %request.department(),
            model = Empty,
            temperature = Empty,
            cache_hit = Empty,
            error = Empty
        );
        self.handle_traced(request, trace_id).instrument(span).await
    }

    async fn handle_traced(&self, request: &ChatRequest, trace_id: String) -> Result<ChatResponse> {
        let started = Instant::now();
        let mut run = RunRecord::start(&trace_id, request, &self.provider, &self.sampling);
        run.environment = self.instrumentation.environment().map(str::to_string);

        let span = Span::current();
        if let Some(model) = &run.model {
            span.record("model", model.as_str());
        }
        span.record("temperature", run.temperature);

        let result = self.run(request, &trace_id, &mut run).await;

        let elapsed = started.elapsed();
        run.timings.total_ms = Some(millis(elapsed));
        if let Err(e) = &result {
            run.fail(e);
            warn!(error = %e, kind = ?e.kind(), "request failed");
        }

        span.record("cache_hit", run.cache_hit);
        span.record("error", run.error);

        let provider = self.provider.kind().as_str();
        let cache = if run.cache_hit { "hit" } else { "miss" };
        let status = if run.error { "error" } else { "ok" };
        metrics::counter!(telemetry::REQUESTS_TOTAL,
            "provider" => provider, "status" => status, "cache" => cache)
        .increment(1);
        metrics::histogram!(telemetry::REQUEST_DURATION_SECONDS,
            "provider" => provider, "cache" => cache)
        .record(elapsed.as_secs_f64());

        self.instrumentation.record_run(&run).await;
        result
    }

    async fn run(
        &self,
        request: &ChatRequest,
        trace_id: &str,
        run: &mut RunRecord,
    ) -> Result<ChatResponse> {
        if request.messages.is_empty() {
            return Err(GatewayError::InvalidRequest(
                "request has no messages".to_string(),
            ));
        }
        if !run.temperature.is_finite() {
            return Err(GatewayError::InvalidRequest(format!(
                "temperature must be a finite number, got {}",
                run.temperature
            )));
        }

        let payloads = self.instrumentation.records_payloads();
        if payloads {
            run.user_message = request.last_message().map(|m| m.content.clone());
        }

        let key = CacheKey::derive(request, &self.provider, &self.sampling);

        // Lookup
        let lookup_started = Instant::now();
        let cached = self
            .lookup(&key)
            .instrument(info_span!(
                spans::CACHE_LOOKUP,
                store = self.cache.name(),
                hit = Empty
            ))
            .await;
        run.timings.cache_lookup_ms = Some(millis(lookup_started.elapsed()));

        if let Some(entry) = cached {
            run.cache_hit = true;
            run.usage = entry.usage;
            if payloads {
                run.response_text = Some(entry.content.clone());
            }
            return Ok(ChatResponse {
                content: entry.content,
                usage: entry.usage,
                finish_reason: entry.finish_reason,
                model: run.model.clone().unwrap_or_default(),
                provider: self.provider.kind(),
                cache_hit: true,
                trace_id: trace_id.to_string(),
            });
        }

        // Render
        let render_started = Instant::now();
        let rendered = info_span!(spans::RENDER_PROMPT, template = self.template.name())
            .in_scope(|| {
                self.template
                    .render(&Bindings::for_request(request, Utc::now().date_naive()))
            });
        let render_elapsed = render_started.elapsed();
        run.template = Some(self.template.name().to_string());
        run.timings.render_ms = Some(millis(render_elapsed));
        metrics::histogram!(telemetry::RENDER_DURATION_SECONDS).record(render_elapsed.as_secs_f64());
        let prompt = rendered?;
        if payloads {
            run.rendered_prompt = Some(prompt.clone());
        }

        // Resolve
        let target = self.provider.target(request.model.as_deref())?;
        let provider = target.provider;
        let model = target.model.clone();

        let completion_request = CompletionRequest {
            target,
            messages: outbound_messages(request, prompt),
            temperature: run.temperature,
            max_tokens: run.max_tokens,
        };

        // Call
        let backend_span = info_span!(
            spans::BACKEND_CALL,
            backend = self.backend.name(),
            provider = %provider,
            model = %model,
            temperature = completion_request.temperature,
            max_tokens = completion_request.max_tokens,
            error = Empty
        );
        let backend_started = Instant::now();
        let result = self
            .backend
            .complete(&completion_request)
            .instrument(backend_span.clone())
            .await;
        let backend_elapsed = backend_started.elapsed();
        run.timings.backend_ms = Some(millis(backend_elapsed));
        metrics::histogram!(telemetry::BACKEND_DURATION_SECONDS,
            "provider" => provider.as_str(),
            "status" => if result.is_ok() { "ok" } else { "error" })
        .record(backend_elapsed.as_secs_f64());

        let completion = match result {
            Ok(completion) => completion,
            Err(e) => {
                backend_span.record("error", true);
                return Err(e);
            }
        };

        run.usage = completion.usage;
        if payloads {
            run.response_text = Some(completion.content.clone());
        }
        if let Some(usage) = completion.usage {
            metrics::counter!(telemetry::TOKENS_TOTAL,
                "provider" => provider.as_str(), "direction" => "prompt")
            .increment(u64::from(usage.prompt_tokens));
            metrics::counter!(telemetry::TOKENS_TOTAL,
                "provider" => provider.as_str(), "direction" => "completion")
            .increment(u64::from(usage.completion_tokens));
        }

        // Populate
        let entry = CacheEntry {
            content: completion.content.clone(),
            usage: completion.usage,
            finish_reason: completion.finish_reason.clone(),
            created_at: Utc::now(),
        };
        self.store(&key, entry)
            .instrument(info_span!(spans::CACHE_STORE, store = self.cache.name()))
            .await;

        Ok(ChatResponse {
            content: completion.content,
            usage: completion.usage,
            finish_reason: completion.finish_reason,
            model: completion.model.unwrap_or(model),
            provider,
            cache_hit: false,
            trace_id: trace_id.to_string(),
        })
    }

    async fn lookup(&self, key: &CacheKey) -> Option<CacheEntry> {
        let store = self.cache.name().to_string();
        let entry = match self.cache.get(key).await {
            Ok(entry) => entry,
            Err(e) => {
                warn!(store = %store, error = %e, "cache lookup failed, treating as miss");
                metrics::counter!(telemetry::CACHE_ERRORS_TOTAL,
                    "store" => store.clone(), "op" => "get")
                .increment(1);
                None
            }
        };

        Span::current().record("hit", entry.is_some());
        if entry.is_some() {
            debug!(%key, "cache hit");
            metrics::counter!(telemetry::CACHE_HITS_TOTAL, "store" => store).increment(1);
        } else {
            metrics::counter!(telemetry::CACHE_MISSES_TOTAL, "store" => store).increment(1);
        }
        entry
    }

    async fn store(&self, key: &CacheKey, entry: CacheEntry) {
        if let Err(e) = self.cache.set(key, entry, self.cache_ttl).await {
            let store = self.cache.name().to_string();
            warn!(store = %store, error = %e, "cache write failed, response not cached");
            metrics::counter!(telemetry::CACHE_ERRORS_TOTAL, "store" => store, "op" => "set")
                .increment(1);
        }
    }

    /// Report the active provider and whether the cache store answers.
    pub async fn health(&self) -> HealthReport {
        let ping = self.cache.ping().await;
        HealthReport {
            provider: self.provider.kind(),
            model: self.provider.model().map(str::to_string),
            provider_configured: self.provider.is_configured(),
            cache_store: self.cache.name().to_string(),
            cache_ok: ping.is_ok(),
            cache_error: ping.err().map(|e| e.to_string()),
            run_sink: self.instrumentation.sink_name().map(str::to_string),
        }
    }
}

/// Earlier turns as-is, then the rendered prompt in place of the last turn.
fn outbound_messages(request: &ChatRequest, prompt: String) -> Vec<Message> {
    let earlier = request.messages.len().saturating_sub(1);
    let mut messages = Vec::with_capacity(earlier + 1);
    messages.extend_from_slice(&request.messages[..earlier]);
    messages.push(Message::user(prompt));
    messages
}

impl std::fmt::Debug for Gateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gateway")
            .field("provider", &self.provider.kind())
            .field("backend", &self.backend.name())
            .field("cache", &self.cache.name())
            .field("template", &self.template.name())
            .field("instrumentation", &self.instrumentation)
            .field("sampling", &self.sampling)
            .field("cache_ttl", &self.cache_ttl)
            .finish()
    }
}
