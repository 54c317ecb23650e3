//! Run-record sinks.
//!
//! A [`RunSink`] receives one [`RunRecord`] per handled request. Sinks may
//! fail; [`Instrumentation`] logs and counts the failure and moves on, so an
//! unreachable collector never fails a request.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{info, warn};

use super::SINK_FAILURES_TOTAL;
use super::record::RunRecord;
use crate::{GatewayError, Result};

/// Timeout for [`HttpRunSink`] posts.
pub const DEFAULT_SINK_TIMEOUT: Duration = Duration::from_secs(5);

/// Destination for run records.
#[async_trait]
pub trait RunSink: Send + Sync {
    /// Sink name for logging/debugging.
    fn name(&self) -> &str;

    /// Deliver one record.
    async fn record(&self, run: &RunRecord) -> Result<()>;
}

/// Emits run records to the configured sink, if any.
///
/// Disabled instrumentation (no sink) makes [`record_run`](Self::record_run)
/// a no-op. Spans and metrics are not affected by this switch.
///
/// Message payloads (user message, rendered prompt, response text) are left
/// out of records unless [`with_payloads`](Self::with_payloads) turns them on.
#[derive(Clone, Default)]
pub struct Instrumentation {
    sink: Option<Arc<dyn RunSink>>,
    payloads: bool,
    environment: Option<String>,
}

impl Instrumentation {
    pub fn new(sink: Arc<dyn RunSink>) -> Self {
        Self::default().with_sink(sink)
    }

    pub fn disabled() -> Self {
        Self::default()
    }

    /// Replace the sink, keeping the other settings.
    pub fn with_sink(mut self, sink: Arc<dyn RunSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Attach message payloads to records.
    pub fn with_payloads(mut self, enabled: bool) -> Self {
        self.payloads = enabled;
        self
    }

    /// Tag every record with a deployment environment.
    pub fn with_environment(mut self, environment: impl Into<String>) -> Self {
        self.environment = Some(environment.into());
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.sink.is_some()
    }

    /// Payloads are on and a sink is set.
    pub fn records_payloads(&self) -> bool {
        self.payloads && self.is_enabled()
    }

    pub fn environment(&self) -> Option<&str> {
        self.environment.as_deref()
    }

    /// Name of the active sink.
    pub fn sink_name(&self) -> Option<&str> {
        self.sink.as_deref().map(|s| s.name())
    }

    /// Deliver `run`. Never fails.
    pub async fn record_run(&self, run: &RunRecord) {
        let Some(sink) = &self.sink else {
            return;
        };
        if let Err(e) = sink.record(run).await {
            warn!(
                sink = sink.name(),
                trace_id = %run.trace_id,
                error = %e,
                "failed to record run"
            );
            metrics::counter!(SINK_FAILURES_TOTAL, "sink" => sink.name().to_string()).increment(1);
        }
    }
}

impl std::fmt::Debug for Instrumentation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Instrumentation")
            .field("sink", &self.sink_name())
            .field("payloads", &self.payloads)
            .field("environment", &self.environment)
            .finish()
    }
}

/// Writes each run as one structured `info` event.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogRunSink;

#[async_trait]
impl RunSink for LogRunSink {
    fn name(&self) -> &str {
        "log"
    }

    async fn record(&self, run: &RunRecord) -> Result<()> {
        let timings = &run.timings;
        info!(
            target: "llmops_gateway::runs",
            trace_id = %run.trace_id,
            provider = %run.provider,
            model = run.model.as_deref(),
            temperature = run.temperature,
            max_tokens = run.max_tokens,
            department = %run.department,
            environment = run.environment.as_deref(),
            template = run.template.as_deref(),
            cache_hit = run.cache_hit,
            cache_lookup_ms = timings.cache_lookup_ms,
            render_ms = timings.render_ms,
            backend_ms = timings.backend_ms,
            total_ms = timings.total_ms,
            prompt_tokens = run.usage.map(|u| u.prompt_tokens),
            completion_tokens = run.usage.map(|u| u.completion_tokens),
            error = run.error,
            error_message = run.error_message.as_deref(),
            user_message = run.user_message.as_deref(),
            rendered_prompt = run.rendered_prompt.as_deref(),
            response_text = run.response_text.as_deref(),
            "run"
        );
        Ok(())
    }
}

/// POSTs each run as JSON to a collector.
#[derive(Clone)]
pub struct HttpRunSink {
    http: Client,
    url: String,
}

impl HttpRunSink {
    pub fn new(url: impl Into<String>) -> Result<Self> {
        Self::with_timeout(url, DEFAULT_SINK_TIMEOUT)
    }

    pub fn with_timeout(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GatewayError::Configuration(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            http,
            url: url.into(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl RunSink for HttpRunSink {
    fn name(&self) -> &str {
        "http"
    }

    async fn record(&self, run: &RunRecord) -> Result<()> {
        let response = self
            .http
            .post(&self.url)
            .json(run)
            .send()
            .await
            .map_err(|e| GatewayError::Sink(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(GatewayError::Sink(format!("collector returned {status}")));
        }
        Ok(())
    }
}

/// Keeps records in memory. Useful for tests and embedding.
#[derive(Debug, Default)]
pub struct MemoryRunSink {
    runs: Mutex<Vec<RunRecord>>,
}

impl MemoryRunSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all records so far, oldest first.
    pub fn runs(&self) -> Vec<RunRecord> {
        self.runs
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn len(&self) -> usize {
        self.runs
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl RunSink for MemoryRunSink {
    fn name(&self) -> &str {
        "memory"
    }

    async fn record(&self, run: &RunRecord) -> Result<()> {
        self.runs
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(run.clone());
        Ok(())
    }
}
