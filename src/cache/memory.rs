//! In-process cache store.
//!
//! [`MemoryCacheStore`] keeps entries in moka's async-friendly bounded cache.
//! Each entry carries the TTL it was stored with and a custom
//! [`Expiry`] makes moka honour it, so different callers can use different
//! TTLs against the same store. Eviction is moka's: expired entries are
//! invisible to `get` immediately and reclaimed lazily.
//!
//! The store is gateway-local. For several gateway instances sharing one
//! cache use [`RedisCacheStore`](super::RedisCacheStore) instead; the
//! pipeline does not care which one it is given.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use moka::Expiry;
use moka::future::Cache;

use super::key::CacheKey;
use super::store::{CacheEntry, CacheStore};
use crate::Result;

/// Configuration for the in-process store.
///
/// ```rust
/// # use llmops_gateway::cache::MemoryCacheConfig;
/// let config = MemoryCacheConfig::new().max_entries(10_000);
/// ```
#[derive(Debug, Clone)]
pub struct MemoryCacheConfig {
    /// Maximum number of cached entries. Default: 10,000.
    pub max_entries: u64,
}

impl Default for MemoryCacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 10_000,
        }
    }
}

impl MemoryCacheConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum number of cached entries.
    pub fn max_entries(mut self, n: u64) -> Self {
        self.max_entries = n;
        self
    }
}

#[derive(Clone)]
struct TimedEntry {
    entry: CacheEntry,
    ttl: Duration,
}

/// Expires each entry after the TTL it was inserted with.
struct PerEntryTtl;

impl Expiry<CacheKey, TimedEntry> for PerEntryTtl {
    fn expire_after_create(
        &self,
        _key: &CacheKey,
        value: &TimedEntry,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(value.ttl)
    }

    // An overwrite restarts the clock with the new TTL.
    fn expire_after_update(
        &self,
        _key: &CacheKey,
        value: &TimedEntry,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.ttl)
    }
}

/// Bounded in-memory store with per-entry TTL.
pub struct MemoryCacheStore {
    cache: Cache<CacheKey, TimedEntry>,
}

impl MemoryCacheStore {
    pub fn new(config: &MemoryCacheConfig) -> Self {
        let cache = Cache::builder()
            .max_capacity(config.max_entries)
            .expire_after(PerEntryTtl)
            .build();
        Self { cache }
    }

    /// Approximate number of live entries.
    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }

    /// Evict all entries.
    pub fn clear(&self) {
        self.cache.invalidate_all();
    }
}

impl Default for MemoryCacheStore {
    fn default() -> Self {
        Self::new(&MemoryCacheConfig::default())
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn get(&self, key: &CacheKey) -> Result<Option<CacheEntry>> {
        Ok(self.cache.get(key).await.map(|timed| timed.entry))
    }

    async fn set(&self, key: &CacheKey, entry: CacheEntry, ttl: Duration) -> Result<()> {
        self.cache.insert(key.clone(), TimedEntry { entry, ttl }).await;
        Ok(())
    }
}
