//! Redis-backed cache store, shared across gateway instances.
//!
//! Entries are stored as JSON strings under `cache:<hex key>` with a native
//! `EX` expiry, so TTL enforcement is redis's job. Connection loss surfaces
//! as [`GatewayError::CacheUnavailable`]; the connection manager reconnects
//! on its own.

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use tracing::{info, warn};

use super::key::CacheKey;
use super::store::{CacheEntry, CacheStore};
use crate::{GatewayError, Result};

/// Prefix for every key written by the gateway.
pub const KEY_PREFIX: &str = "cache:";

/// Shared cache store on top of redis.
#[derive(Clone)]
pub struct RedisCacheStore {
    conn: ConnectionManager,
}

impl RedisCacheStore {
    /// Connect to `redis_url` (e.g. `redis://redis:6379/0`).
    pub async fn connect(redis_url: &str) -> Result<Self> {
        let client = redis::Client::open(redis_url).map_err(unavailable)?;
        let conn = ConnectionManager::new(client).await.map_err(unavailable)?;
        info!(url = %sanitize_url(redis_url), "redis cache connected");
        Ok(Self { conn })
    }

    /// Wrap an existing connection manager.
    pub fn from_connection(conn: ConnectionManager) -> Self {
        Self { conn }
    }

    fn redis_key(key: &CacheKey) -> String {
        format!("{KEY_PREFIX}{key}")
    }
}

#[async_trait]
impl CacheStore for RedisCacheStore {
    fn name(&self) -> &str {
        "redis"
    }

    async fn get(&self, key: &CacheKey) -> Result<Option<CacheEntry>> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = redis::cmd("GET")
            .arg(Self::redis_key(key))
            .query_async(&mut conn)
            .await
            .map_err(unavailable)?;

        let Some(raw) = raw else {
            return Ok(None);
        };

        match serde_json::from_str(&raw) {
            Ok(entry) => Ok(Some(entry)),
            Err(e) => {
                // Foreign or stale-schema value: ignore it, the next set overwrites.
                warn!(key = %key, error = %e, "undecodable cache entry, treating as miss");
                Ok(None)
            }
        }
    }

    async fn set(&self, key: &CacheKey, entry: CacheEntry, ttl: Duration) -> Result<()> {
        let value = serde_json::to_string(&entry).map_err(encode_failed)?;
        let mut conn = self.conn.clone();
        let _: () = redis::cmd("SET")
            .arg(Self::redis_key(key))
            .arg(value)
            .arg("EX")
            .arg(ttl_secs(ttl))
            .query_async(&mut conn)
            .await
            .map_err(unavailable)?;
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(unavailable)?;
        Ok(())
    }
}

fn unavailable(err: redis::RedisError) -> GatewayError {
    GatewayError::CacheUnavailable(err.to_string())
}

fn encode_failed(err: serde_json::Error) -> GatewayError {
    GatewayError::CacheUnavailable(format!("cache entry encoding: {err}"))
}

/// Redis `EX` takes whole seconds and rejects zero.
fn ttl_secs(ttl: Duration) -> u64 {
    let secs = ttl.as_secs();
    if ttl.subsec_nanos() > 0 { secs + 1 } else { secs.max(1) }
}

/// Hide the password part of a redis URL for logging.
fn sanitize_url(url: &str) -> String {
    match (url.find("://"), url.rfind('@')) {
        (Some(scheme_end), Some(at)) if at > scheme_end => {
            format!("{}://***{}", &url[..scheme_end], &url[at..])
        }
        _ => url.to_string(),
    }
}
