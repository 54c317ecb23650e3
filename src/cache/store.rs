//! Cache store capability.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::key::CacheKey;
use crate::Result;
use crate::types::{FinishReason, Usage};

/// A cached completion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
    #[serde(default)]
    pub finish_reason: FinishReason,
    pub created_at: DateTime<Utc>,
}

impl CacheEntry {
    pub fn new(content: impl Into<String>, usage: Option<Usage>) -> Self {
        Self {
            content: content.into(),
            usage,
            finish_reason: FinishReason::Stop,
            created_at: Utc::now(),
        }
    }
}

/// Key/value store with expiry.
///
/// A miss is `Ok(None)`, never an error. Errors mean the store itself could
/// not be reached and should be reported as
/// [`GatewayError::CacheUnavailable`](crate::GatewayError::CacheUnavailable).
/// Implementations must be safe under concurrent `get`/`set` on one key; the
/// last write wins.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Store name for logging/debugging.
    fn name(&self) -> &str;

    /// Look up a live entry. Entries older than their TTL are absent.
    async fn get(&self, key: &CacheKey) -> Result<Option<CacheEntry>>;

    /// Insert or overwrite an entry that expires after `ttl`.
    async fn set(&self, key: &CacheKey, entry: CacheEntry, ttl: Duration) -> Result<()>;

    /// Reachability probe for health reports.
    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

/// Store used when caching is disabled: every lookup misses.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopCacheStore;

#[async_trait]
impl CacheStore for NoopCacheStore {
    fn name(&self) -> &str {
        "noop"
    }

    async fn get(&self, _key: &CacheKey) -> Result<Option<CacheEntry>> {
        Ok(None)
    }

    async fn set(&self, _key: &CacheKey, _entry: CacheEntry, _ttl: Duration) -> Result<()> {
        Ok(())
    }
}
