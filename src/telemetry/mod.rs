//! Telemetry: metric names, span names, and run records.
//!
//! Metrics go through the `metrics` facade. Consumers install their own
//! recorder (e.g. prometheus, statsd); without a recorder installed, all
//! metric calls are no-ops. Spans are plain `tracing` spans, so any
//! subscriber (fmt, OpenTelemetry bridge, ...) can pick them up.
//!
//! Per-request summaries are [`RunRecord`]s handed to a [`RunSink`] through
//! [`Instrumentation`], which never lets a sink failure reach the caller.
//!
//! # Metric naming conventions
//!
//! All metrics are prefixed with `gateway_`. Counters end in `_total`,
//! histograms use meaningful units (e.g. `_seconds`).
//!
//! # Common labels
//!
//! - `provider`: active provider tag ("azure", "openai", "none")
//! - `status`: outcome, "ok" or "error"
//! - `cache`: "hit" or "miss"
//! - `direction`: token direction, "prompt" or "completion"

pub mod record;
pub mod sink;

pub use record::{RunRecord, StageTimings};
pub use sink::{HttpRunSink, Instrumentation, LogRunSink, MemoryRunSink, RunSink};

/// Total requests handled.
///
/// Labels: `provider`, `status` ("ok" | "error"), `cache` ("hit" | "miss").
pub const REQUESTS_TOTAL: &str = "gateway_requests_total";

/// End-to-end request duration in seconds.
///
/// Labels: `provider`, `cache`.
pub const REQUEST_DURATION_SECONDS: &str = "gateway_request_duration_seconds";

/// Backend call duration in seconds.
///
/// Labels: `provider`, `status`.
pub const BACKEND_DURATION_SECONDS: &str = "gateway_backend_duration_seconds";

/// Prompt rendering duration in seconds.
pub const RENDER_DURATION_SECONDS: &str = "gateway_render_duration_seconds";

/// Total cache hits.
///
/// Labels: `store`.
pub const CACHE_HITS_TOTAL: &str = "gateway_cache_hits_total";

/// Total cache misses.
///
/// Labels: `store`.
pub const CACHE_MISSES_TOTAL: &str = "gateway_cache_misses_total";

/// Total cache store failures (downgraded to a miss or a skipped write).
///
/// Labels: `store`, `op` ("get" | "set").
pub const CACHE_ERRORS_TOTAL: &str = "gateway_cache_errors_total";

/// Total tokens reported by the backend.
///
/// Labels: `provider`, `direction` ("prompt" | "completion").
pub const TOKENS_TOTAL: &str = "gateway_tokens_total";

/// Total run records a sink failed to accept.
///
/// Labels: `sink`.
pub const SINK_FAILURES_TOTAL: &str = "gateway_sink_failures_total";

/// Span names, one per pipeline stage.
pub mod spans {
    pub const REQUEST: &str = "gateway.request";
    pub const CACHE_LOOKUP: &str = "gateway.cache_lookup";
    pub const RENDER_PROMPT: &str = "gateway.render_prompt";
    pub const BACKEND_CALL: &str = "gateway.backend_call";
    pub const CACHE_STORE: &str = "gateway.cache_store";
}
