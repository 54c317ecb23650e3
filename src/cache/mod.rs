//! Response caching.
//!
//! - [`key`] derives the [`CacheKey`] fingerprint of a request.
//! - [`store`] defines the [`CacheStore`] capability and [`CacheEntry`].
//! - [`MemoryCacheStore`] is the gateway-local moka store,
//!   [`RedisCacheStore`] (feature `redis`) the shared one, and
//!   [`NoopCacheStore`] what you get with caching disabled.
//!
//! The pipeline treats every store failure as a miss; see
//! [`Gateway::handle`](crate::Gateway::handle).

pub mod key;
pub mod memory;
#[cfg(feature = "redis")]
pub mod redis;
pub mod store;

pub use key::{CacheKey, KeyMaterial};
pub use memory::{MemoryCacheConfig, MemoryCacheStore};
#[cfg(feature = "redis")]
pub use self::redis::RedisCacheStore;
pub use store::{CacheEntry, CacheStore, NoopCacheStore};
