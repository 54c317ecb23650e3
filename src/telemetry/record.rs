//! Per-request run summaries.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::SamplingDefaults;
use crate::error::{ErrorKind, GatewayError};
use crate::providers::{ProviderConfig, ProviderKind};
use crate::types::{ChatRequest, Usage};

/// Stage durations in milliseconds. A stage that did not run is `None`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StageTimings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_lookup_ms: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub render_ms: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backend_ms: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_ms: Option<f64>,
}

pub(crate) fn millis(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

/// Summary of one handled request, emitted once when it finishes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunRecord {
    pub trace_id: String,
    pub started_at: DateTime<Utc>,
    pub provider: ProviderKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
    pub department: String,
    /// Deployment tag, e.g. `production`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub environment: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,
    pub cache_hit: bool,
    pub timings: StageTimings,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
    pub error: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// Payloads, only when payload recording is switched on.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rendered_prompt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_text: Option<String>,
}

impl RunRecord {
    /// Open a record with the request's effective parameters.
    pub fn start(
        trace_id: impl Into<String>,
        request: &ChatRequest,
        provider: &ProviderConfig,
        defaults: &SamplingDefaults,
    ) -> Self {
        Self {
            trace_id: trace_id.into(),
            started_at: Utc::now(),
            provider: provider.kind(),
            model: provider
                .effective_model(request.model.as_deref())
                .map(str::to_string),
            temperature: request.temperature.unwrap_or(defaults.temperature),
            max_tokens: request.max_tokens.unwrap_or(defaults.max_tokens),
            department: request.department().to_string(),
            environment: None,
            template: None,
            cache_hit: false,
            timings: StageTimings::default(),
            usage: None,
            error: false,
            error_kind: None,
            error_message: None,
            user_message: None,
            rendered_prompt: None,
            response_text: None,
        }
    }

    /// Mark the run as failed with `err`.
    pub fn fail(&mut self, err: &GatewayError) {
        self.error = true;
        self.error_kind = Some(err.kind());
        self.error_message = Some(err.to_string());
    }
}
