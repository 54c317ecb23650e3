//! Startup configuration.
//!
//! Everything is read once from the environment into a typed
//! [`GatewayConfig`]; nothing is re-read per request and there is no hot
//! reload. Malformed values are collected and reported together as a single
//! [`GatewayError::Configuration`]. Missing provider credentials are *not* a
//! configuration error at this stage: they select the unconfigured provider
//! and only fail requests that try to use it.
//!
//! | Key | Default |
//! |---|---|
//! | `GATEWAY_CACHE_ENABLED` | `true` |
//! | `GATEWAY_CACHE_TTL_SECS` | `3600` |
//! | `GATEWAY_CACHE_MAX_ENTRIES` | `10000` |
//! | `REDIS_URL` | unset (in-process cache) |
//! | `GATEWAY_DEFAULT_TEMPERATURE` | `0.3` |
//! | `GATEWAY_DEFAULT_MAX_TOKENS` | `512` |
//! | `GATEWAY_BACKEND_TIMEOUT_SECS` | `60` |
//! | `GATEWAY_TELEMETRY_ENABLED` | `true` |
//! | `GATEWAY_RUN_SINK_URL` | unset (log sink) |
//! | `GATEWAY_RECORD_PAYLOADS` | `false` |
//! | `GATEWAY_ENVIRONMENT` | unset |
//! | `GATEWAY_PROMPT_TEMPLATE` | built-in template |
//!
//! Provider credential keys are listed in [`crate::providers::selector`].

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::providers::ProviderCredentials;
use crate::{GatewayError, Result};

pub const CACHE_ENABLED: &str = "GATEWAY_CACHE_ENABLED";
pub const CACHE_TTL_SECS: &str = "GATEWAY_CACHE_TTL_SECS";
pub const CACHE_MAX_ENTRIES: &str = "GATEWAY_CACHE_MAX_ENTRIES";
pub const REDIS_URL: &str = "REDIS_URL";
pub const DEFAULT_TEMPERATURE: &str = "GATEWAY_DEFAULT_TEMPERATURE";
pub const DEFAULT_MAX_TOKENS: &str = "GATEWAY_DEFAULT_MAX_TOKENS";
pub const BACKEND_TIMEOUT_SECS: &str = "GATEWAY_BACKEND_TIMEOUT_SECS";
pub const TELEMETRY_ENABLED: &str = "GATEWAY_TELEMETRY_ENABLED";
pub const RUN_SINK_URL: &str = "GATEWAY_RUN_SINK_URL";
pub const RECORD_PAYLOADS: &str = "GATEWAY_RECORD_PAYLOADS";
pub const ENVIRONMENT: &str = "GATEWAY_ENVIRONMENT";
pub const PROMPT_TEMPLATE: &str = "GATEWAY_PROMPT_TEMPLATE";

/// Complete gateway configuration.
#[derive(Debug, Clone, Default)]
pub struct GatewayConfig {
    pub providers: ProviderCredentials,
    pub cache: CacheSettings,
    pub sampling: SamplingDefaults,
    pub backend: BackendSettings,
    pub telemetry: TelemetrySettings,
    /// Prompt template file; `None` uses the built-in template.
    pub prompt_template: Option<PathBuf>,
}

/// Cache behaviour.
#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub enabled: bool,
    pub ttl: Duration,
    /// Capacity of the in-process store.
    pub max_entries: u64,
    /// Use a shared redis store instead of the in-process one.
    pub redis_url: Option<String>,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl: Duration::from_secs(3600),
            max_entries: 10_000,
            redis_url: None,
        }
    }
}

/// Sampling parameters applied when a request leaves them unset.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplingDefaults {
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for SamplingDefaults {
    fn default() -> Self {
        Self {
            temperature: 0.3,
            max_tokens: 512,
        }
    }
}

/// Outbound backend settings.
#[derive(Debug, Clone)]
pub struct BackendSettings {
    pub timeout: Duration,
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(60),
        }
    }
}

/// Run-record emission.
#[derive(Debug, Clone)]
pub struct TelemetrySettings {
    pub enabled: bool,
    /// POST run records here; log them when unset.
    pub sink_url: Option<String>,
    /// Attach user message, rendered prompt and response text to records.
    pub record_payloads: bool,
    /// Environment tag carried by every record.
    pub environment: Option<String>,
}

impl Default for TelemetrySettings {
    fn default() -> Self {
        Self {
            enabled: true,
            sink_url: None,
            record_payloads: false,
            environment: None,
        }
    }
}

impl GatewayConfig {
    /// Read configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through a lookup function.
    ///
    /// Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let mut problems = Vec::new();
        let defaults = GatewayConfig::default();

        let cache = CacheSettings {
            enabled: parse_or(&get, CACHE_ENABLED, defaults.cache.enabled, parse_bool, &mut problems),
            ttl: parse_or(&get, CACHE_TTL_SECS, defaults.cache.ttl, parse_secs, &mut problems),
            max_entries: parse_or(
                &get,
                CACHE_MAX_ENTRIES,
                defaults.cache.max_entries,
                parse_positive::<u64>,
                &mut problems,
            ),
            redis_url: get(REDIS_URL),
        };

        let sampling = SamplingDefaults {
            temperature: parse_or(
                &get,
                DEFAULT_TEMPERATURE,
                defaults.sampling.temperature,
                parse_temperature,
                &mut problems,
            ),
            max_tokens: parse_or(
                &get,
                DEFAULT_MAX_TOKENS,
                defaults.sampling.max_tokens,
                parse_positive::<u32>,
                &mut problems,
            ),
        };

        let backend = BackendSettings {
            timeout: parse_or(
                &get,
                BACKEND_TIMEOUT_SECS,
                defaults.backend.timeout,
                parse_secs,
                &mut problems,
            ),
        };

        let telemetry = TelemetrySettings {
            enabled: parse_or(
                &get,
                TELEMETRY_ENABLED,
                defaults.telemetry.enabled,
                parse_bool,
                &mut problems,
            ),
            sink_url: get(RUN_SINK_URL),
            record_payloads: parse_or(
                &get,
                RECORD_PAYLOADS,
                defaults.telemetry.record_payloads,
                parse_bool,
                &mut problems,
            ),
            environment: get(ENVIRONMENT),
        };

        if !problems.is_empty() {
            return Err(GatewayError::Configuration(problems.join("; ")));
        }

        Ok(Self {
            providers: ProviderCredentials::from_lookup(&lookup),
            cache,
            sampling,
            backend,
            telemetry,
            prompt_template: get(PROMPT_TEMPLATE).map(PathBuf::from),
        })
    }
}

/// Parse `key` if set, recording a problem and keeping `default` otherwise.
fn parse_or<T, G, P>(get: &G, key: &str, default: T, parse: P, problems: &mut Vec<String>) -> T
where
    G: Fn(&str) -> Option<String>,
    P: Fn(&str) -> std::result::Result<T, String>,
{
    match get(key) {
        None => default,
        Some(raw) => parse(&raw).unwrap_or_else(|why| {
            problems.push(format!("{key}={raw:?}: {why}"));
            default
        }),
    }
}

fn parse_bool(raw: &str) -> std::result::Result<bool, String> {
    match raw.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err("expected a boolean".to_string()),
    }
}

fn parse_secs(raw: &str) -> std::result::Result<Duration, String> {
    parse_positive::<u64>(raw).map(Duration::from_secs)
}

fn parse_positive<T>(raw: &str) -> std::result::Result<T, String>
where
    T: FromStr + PartialOrd + Default,
{
    match raw.parse::<T>() {
        Ok(v) if v > T::default() => Ok(v),
        Ok(_) => Err("must be greater than zero".to_string()),
        Err(_) => Err("expected a positive integer".to_string()),
    }
}

fn parse_temperature(raw: &str) -> std::result::Result<f32, String> {
    match raw.parse::<f32>() {
        Ok(t) if (0.0..=2.0).contains(&t) => Ok(t),
        Ok(_) => Err("must be between 0 and 2".to_string()),
        Err(_) => Err("expected a number".to_string()),
    }
}
