//! Shared response cache for upstream weather and news data.
//!
//! [`CacheStore`] is the storage seam (in-memory or Redis); [`CacheAside`]
//! is the read-through resolver route handlers call with a key, a TTL and
//! the upstream fetch to run on a miss.
//!
//! Concurrent misses on the same key are not de-duplicated: each caller
//! fetches upstream and the last write wins.

use async_trait::async_trait;
use serde_json::Value;

use crate::config::{AppConfig, CacheBackend};
use crate::errors::AppError;
use std::sync::Arc;

pub mod key;
pub mod memory;
pub mod redis;
pub mod resolver;

pub use self::key::CacheKey;
pub use self::memory::InMemoryCache;
pub use self::redis::RedisCache;
pub use self::resolver::{CacheAside, Resolved};

#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Returns the stored value if it has not expired.
    async fn get(&self, key: &str) -> Result<Option<Value>, AppError>;

    async fn set(&self, key: &str, value: &Value, ttl_seconds: u64) -> Result<(), AppError>;

    async fn health_check(&self) -> Result<(), AppError>;

    fn backend_name(&self) -> &'static str;
}

pub fn create_cache(config: &AppConfig) -> Result<Arc<dyn CacheStore>, AppError> {
    match config.cache_backend {
        CacheBackend::Memory => Ok(Arc::new(InMemoryCache::new())),
        CacheBackend::Redis => Ok(Arc::new(RedisCache::new(&config.redis_url)?)),
    }
}
