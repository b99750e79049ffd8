use crate::cache::CacheStore;
use crate::errors::AppError;
use async_trait::async_trait;
use redis::AsyncCommands;
use serde_json::Value;

/// Cache entries are stored as JSON strings with a Redis-side expiry.
pub struct RedisCache {
    client: redis::Client,
}

impl RedisCache {
    pub fn new(redis_url: &str) -> Result<Self, AppError> {
        let client = redis::Client::open(redis_url)?;
        Ok(Self { client })
    }
}

#[async_trait]
impl CacheStore for RedisCache {
    async fn get(&self, key: &str) -> Result<Option<Value>, AppError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let raw: Option<String> = conn.get(key).await?;
        match raw {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &Value, ttl_seconds: u64) -> Result<(), AppError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let raw = serde_json::to_string(value)?;
        conn.set_ex::<_, _, ()>(key, raw, ttl_seconds).await?;
        Ok(())
    }

    async fn health_check(&self) -> Result<(), AppError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        redis::cmd("PING").query_async::<String>(&mut conn).await?;
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "redis"
    }
}
