//! Deterministic provider selection.
//!
//! Precedence is fixed:
//!
//! 1. Azure OpenAI, when `AZURE_OPENAI_KEY` **and** `AZURE_OPENAI_ENDPOINT`
//!    are both non-empty
//! 2. OpenAI, when `OPENAI_API_KEY` is non-empty
//! 3. [`ProviderConfig::Unconfigured`]
//!
//! A partial credential set (e.g. an Azure key without an endpoint) does not
//! count and falls through to the next entry.

use tracing::{info, warn};

use super::config::{
    ApiKey, AzureConfig, DEFAULT_AZURE_API_VERSION, DEFAULT_AZURE_DEPLOYMENT,
    DEFAULT_OPENAI_BASE_URL, DEFAULT_OPENAI_MODEL, OpenAiConfig, ProviderConfig,
};

/// Environment variable names for provider credentials.
pub const AZURE_OPENAI_KEY: &str = "AZURE_OPENAI_KEY";
pub const AZURE_OPENAI_ENDPOINT: &str = "AZURE_OPENAI_ENDPOINT";
pub const AZURE_OPENAI_API_VERSION: &str = "AZURE_OPENAI_API_VERSION";
pub const AZURE_OPENAI_DEPLOYMENT_NAME: &str = "AZURE_OPENAI_DEPLOYMENT_NAME";
pub const OPENAI_API_KEY: &str = "OPENAI_API_KEY";
pub const OPENAI_MODEL: &str = "OPENAI_MODEL";
pub const OPENAI_BASE_URL: &str = "OPENAI_BASE_URL";

/// Raw credential values as read at startup. Everything is optional here;
/// [`select`] decides what is usable.
#[derive(Debug, Clone, Default)]
pub struct ProviderCredentials {
    pub azure_key: Option<String>,
    pub azure_endpoint: Option<String>,
    pub azure_api_version: Option<String>,
    pub azure_deployment: Option<String>,
    pub openai_key: Option<String>,
    pub openai_model: Option<String>,
    pub openai_base_url: Option<String>,
}

impl ProviderCredentials {
    /// Read credentials through a lookup function (e.g. `std::env::var`).
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            azure_key: lookup(AZURE_OPENAI_KEY),
            azure_endpoint: lookup(AZURE_OPENAI_ENDPOINT),
            azure_api_version: lookup(AZURE_OPENAI_API_VERSION),
            azure_deployment: lookup(AZURE_OPENAI_DEPLOYMENT_NAME),
            openai_key: lookup(OPENAI_API_KEY),
            openai_model: lookup(OPENAI_MODEL),
            openai_base_url: lookup(OPENAI_BASE_URL),
        }
    }
}

/// Trimmed value, or `None` when missing or blank.
fn present(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn or_default(value: &Option<String>, default: &str) -> String {
    present(value).unwrap_or_else(|| default.to_string())
}

/// Pick the active provider. Total: always returns a config.
pub fn select(creds: &ProviderCredentials) -> ProviderConfig {
    let azure_key = present(&creds.azure_key);
    let azure_endpoint = present(&creds.azure_endpoint);

    if let (Some(key), Some(endpoint)) = (azure_key.as_ref(), azure_endpoint.as_ref()) {
        return ProviderConfig::Azure(AzureConfig {
            api_key: ApiKey::new(key.clone()),
            endpoint: endpoint.clone(),
            api_version: or_default(&creds.azure_api_version, DEFAULT_AZURE_API_VERSION),
            deployment: or_default(&creds.azure_deployment, DEFAULT_AZURE_DEPLOYMENT),
        });
    }

    if azure_key.is_some() != azure_endpoint.is_some() {
        warn!(
            key_set = azure_key.is_some(),
            endpoint_set = azure_endpoint.is_some(),
            "incomplete Azure OpenAI credentials, skipping"
        );
    }

    if let Some(key) = present(&creds.openai_key) {
        return ProviderConfig::OpenAi(OpenAiConfig {
            api_key: ApiKey::new(key),
            model: or_default(&creds.openai_model, DEFAULT_OPENAI_MODEL),
            base_url: or_default(&creds.openai_base_url, DEFAULT_OPENAI_BASE_URL),
        });
    }

    ProviderConfig::Unconfigured {
        reason: format!(
            "set {OPENAI_API_KEY}, or {AZURE_OPENAI_KEY} together with {AZURE_OPENAI_ENDPOINT}"
        ),
    }
}

/// Log the selection once at startup. Never logs secrets.
pub fn log_selection(config: &ProviderConfig) {
    match config {
        ProviderConfig::Azure(c) => info!(
            provider = "azure",
            deployment = %c.deployment,
            endpoint = %c.endpoint,
            api_version = %c.api_version,
            "LLM provider selected"
        ),
        ProviderConfig::OpenAi(c) => info!(
            provider = "openai",
            model = %c.model,
            base_url = %c.base_url,
            "LLM provider selected"
        ),
        ProviderConfig::Unconfigured { reason } => warn!(
            provider = "none",
            %reason,
            "no LLM provider configured, chat requests will fail"
        ),
    }
}
