//! Active provider configuration and call shaping.
//!
//! A [`ProviderConfig`] is built once at startup by
//! [`select`](super::selector::select) and never changes afterwards.
//! [`ProviderConfig::target`] is the one place that knows how each provider
//! kind wants to be called; nothing else in the crate branches on provider
//! identity.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{GatewayError, Result};

/// Default Azure OpenAI API version.
pub const DEFAULT_AZURE_API_VERSION: &str = "2024-02-15-preview";

/// Default Azure deployment name.
pub const DEFAULT_AZURE_DEPLOYMENT: &str = "gpt-4o-mini";

/// Default OpenAI model.
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";

/// Default OpenAI-compatible base URL.
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Which kind of provider is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Azure OpenAI (deployment-addressed).
    Azure,
    /// OpenAI or any OpenAI-compatible endpoint.
    OpenAi,
    /// No usable credentials.
    None,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Azure => "azure",
            ProviderKind::OpenAi => "openai",
            ProviderKind::None => "none",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An API key that never shows up in `Debug` output or logs.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// The raw secret, for building request headers only.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ApiKey(<redacted len={}>)", self.0.len())
    }
}

/// Azure OpenAI credentials and addressing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AzureConfig {
    pub api_key: ApiKey,
    pub endpoint: String,
    pub api_version: String,
    pub deployment: String,
}

/// OpenAI credentials and addressing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenAiConfig {
    pub api_key: ApiKey,
    pub model: String,
    pub base_url: String,
}

/// The active provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderConfig {
    Azure(AzureConfig),
    OpenAi(OpenAiConfig),
    /// Sentinel: nothing usable was configured. Using it is an error.
    Unconfigured { reason: String },
}

impl ProviderConfig {
    pub fn kind(&self) -> ProviderKind {
        match self {
            ProviderConfig::Azure(_) => ProviderKind::Azure,
            ProviderConfig::OpenAi(_) => ProviderKind::OpenAi,
            ProviderConfig::Unconfigured { .. } => ProviderKind::None,
        }
    }

    /// Model (OpenAI) or deployment (Azure) used when a request sets none.
    pub fn model(&self) -> Option<&str> {
        match self {
            ProviderConfig::Azure(c) => Some(&c.deployment),
            ProviderConfig::OpenAi(c) => Some(&c.model),
            ProviderConfig::Unconfigured { .. } => None,
        }
    }

    /// Base endpoint, for logging and health reports.
    pub fn endpoint(&self) -> Option<&str> {
        match self {
            ProviderConfig::Azure(c) => Some(&c.endpoint),
            ProviderConfig::OpenAi(c) => Some(&c.base_url),
            ProviderConfig::Unconfigured { .. } => None,
        }
    }

    pub fn is_configured(&self) -> bool {
        !matches!(self, ProviderConfig::Unconfigured { .. })
    }

    /// Effective model for a request: the override if given, else the default.
    pub fn effective_model<'a>(&'a self, model_override: Option<&'a str>) -> Option<&'a str> {
        model_override.or_else(|| self.model())
    }

    /// Resolve the backend call shape.
    ///
    /// Fails with [`GatewayError::NoProvider`] for the unconfigured sentinel,
    /// and with [`GatewayError::InvalidRequest`] when an Azure override is not
    /// a plain deployment name.
    pub fn target(&self, model_override: Option<&str>) -> Result<CallTarget> {
        match self {
            ProviderConfig::Azure(c) => {
                if let Some(deployment) = model_override {
                    check_deployment_name(deployment)?;
                }
                let deployment = model_override.unwrap_or(&c.deployment);
                Ok(CallTarget {
                    provider: ProviderKind::Azure,
                    url: format!(
                        "{}/openai/deployments/{}/chat/completions?api-version={}",
                        c.endpoint.trim_end_matches('/'),
                        deployment,
                        c.api_version
                    ),
                    auth: AuthHeader::ApiKey(c.api_key.clone()),
                    model: deployment.to_string(),
                    model_in_body: false,
                })
            }
            ProviderConfig::OpenAi(c) => {
                let model = model_override.unwrap_or(&c.model);
                Ok(CallTarget {
                    provider: ProviderKind::OpenAi,
                    url: format!("{}/chat/completions", c.base_url.trim_end_matches('/')),
                    auth: AuthHeader::Bearer(c.api_key.clone()),
                    model: model.to_string(),
                    model_in_body: true,
                })
            }
            ProviderConfig::Unconfigured { reason } => Err(GatewayError::NoProvider(reason.clone())),
        }
    }
}

/// Azure deployment names travel in the URL path: one segment of
/// `[A-Za-z0-9._-]`, not `.` or `..`.
fn check_deployment_name(name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && name != "."
        && name != ".."
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'));
    if valid {
        Ok(())
    } else {
        Err(GatewayError::InvalidRequest(format!(
            "invalid Azure deployment name {name:?}"
        )))
    }
}

/// How a call authenticates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthHeader {
    /// `api-key: <key>` (Azure).
    ApiKey(ApiKey),
    /// `Authorization: Bearer <key>` (OpenAI).
    Bearer(ApiKey),
}

impl AuthHeader {
    /// Header name and value.
    pub fn header(&self) -> (&'static str, String) {
        match self {
            AuthHeader::ApiKey(key) => ("api-key", key.expose().to_string()),
            AuthHeader::Bearer(key) => ("Authorization", format!("Bearer {}", key.expose())),
        }
    }
}

/// Provider-agnostic description of where and how to send a completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallTarget {
    pub provider: ProviderKind,
    pub url: String,
    pub auth: AuthHeader,
    /// Model or deployment identifier, for the body and for instrumentation.
    pub model: String,
    /// Whether the body must carry a `model` field (Azure addresses by URL).
    pub model_in_body: bool,
}
