//! Gateway error types

use std::time::Duration;

use serde::Serialize;

/// Coarse classification of a [`GatewayError`].
///
/// Transports map this to a user-visible failure: `Configuration` is an
/// operator problem (nothing to retry), `Backend` may be transient.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// No usable provider, or malformed startup configuration.
    Configuration,
    /// The LLM backend call failed or timed out.
    Backend,
    /// The cache store could not be reached.
    CacheUnavailable,
    /// A prompt template failed to parse or references an unbound variable.
    Template,
    /// The inbound request cannot be handled as given.
    InvalidRequest,
    /// The run-record sink rejected a record.
    Sink,
}

/// Gateway error types
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    // Configuration errors
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("no LLM provider configured: {0}")]
    NoProvider(String),

    // Request errors
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    // Backend/network errors
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("backend call timed out")]
    Timeout,

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Option<Duration> },

    #[error("authentication failed")]
    AuthenticationFailed,

    #[error("empty response from model")]
    EmptyResponse,

    // Cache errors (recovered locally by the pipeline)
    #[error("cache unavailable: {0}")]
    CacheUnavailable(String),

    // Startup-only errors
    #[error("template error: {0}")]
    Template(String),

    // Instrumentation errors (always swallowed by the pipeline)
    #[error("run sink error: {0}")]
    Sink(String),

    // Data errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl GatewayError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            GatewayError::Configuration(_) | GatewayError::NoProvider(_) => {
                ErrorKind::Configuration
            }
            GatewayError::InvalidRequest(_) => ErrorKind::InvalidRequest,
            GatewayError::Http(_)
            | GatewayError::Timeout
            | GatewayError::Api { .. }
            | GatewayError::RateLimited { .. }
            | GatewayError::AuthenticationFailed
            | GatewayError::EmptyResponse
            | GatewayError::Json(_) => ErrorKind::Backend,
            GatewayError::CacheUnavailable(_) => ErrorKind::CacheUnavailable,
            GatewayError::Template(_) => ErrorKind::Template,
            GatewayError::Sink(_) => ErrorKind::Sink,
        }
    }

    /// Whether the failure came from the LLM backend.
    pub fn is_backend(&self) -> bool {
        self.kind() == ErrorKind::Backend
    }

    /// Whether the failure is an operator misconfiguration.
    pub fn is_configuration(&self) -> bool {
        self.kind() == ErrorKind::Configuration
    }

    /// Whether a retry by an outer layer could plausibly succeed.
    ///
    /// The gateway itself never retries; this is advisory for transports.
    pub fn is_transient(&self) -> bool {
        match self {
            GatewayError::RateLimited { .. } | GatewayError::Http(_) | GatewayError::Timeout => {
                true
            }
            GatewayError::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            GatewayError::Timeout
        } else {
            GatewayError::Http(err.to_string())
        }
    }
}

impl From<tera::Error> for GatewayError {
    fn from(err: tera::Error) -> Self {
        // tera nests the useful detail (e.g. the missing variable) in `source`
        let mut msg = err.to_string();
        let mut source = std::error::Error::source(&err);
        while let Some(cause) = source {
            msg.push_str(": ");
            msg.push_str(&cause.to_string());
            source = cause.source();
        }
        GatewayError::Template(msg)
    }
}

/// Result type alias for gateway operations
pub type Result<T> = std::result::Result<T, GatewayError>;
