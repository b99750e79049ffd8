use std::future::Future;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::cache::CacheStore;
use crate::errors::AppError;

/// A resolved value and whether it was served from cache.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved<T> {
    pub value: T,
    pub from_cache: bool,
}

/// Read-through resolver in front of a [`CacheStore`].
#[derive(Clone)]
pub struct CacheAside {
    store: Arc<dyn CacheStore>,
}

impl CacheAside {
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn CacheStore> {
        &self.store
    }

    /// Returns the cached value for `key`, or runs `fetch`, caches its
    /// result for `ttl_seconds` and returns it.
    ///
    /// Errors from `fetch` are returned unchanged and nothing is written, so
    /// the next call for the same key fetches again.
    pub async fn resolve<T, F, Fut>(
        &self,
        key: &str,
        ttl_seconds: u64,
        fetch: F,
    ) -> Result<Resolved<T>, AppError>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, AppError>>,
    {
        if let Some(cached) = self.store.get(key).await? {
            debug!(key, "cache hit");
            return Ok(Resolved {
                value: serde_json::from_value(cached)?,
                from_cache: true,
            });
        }

        debug!(key, "cache miss");
        let value = fetch().await?;
        self.store
            .set(key, &serde_json::to_value(&value)?, ttl_seconds)
            .await?;

        Ok(Resolved {
            value,
            from_cache: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheKey, InMemoryCache};
    use crate::upstream::{UpstreamError, WeatherQuery};
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn resolver() -> (CacheAside, Arc<InMemoryCache>) {
        let cache = Arc::new(InMemoryCache::new());
        (CacheAside::new(cache.clone()), cache)
    }

    async fn counted_fetch(calls: &AtomicUsize, value: Value) -> Result<Value, AppError> {
        calls.fetch_add(1, Ordering::SeqCst);
        Ok(value)
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_call_within_ttl_is_served_from_cache() {
        let (resolver, _) = resolver();
        let counter = AtomicUsize::new(0);
        let calls = &counter;

        let first = resolver
            .resolve("weather:city:delhi", 600, || counted_fetch(calls, json!({"temp": 31})))
            .await
            .unwrap();
        assert!(!first.from_cache);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let second = resolver
            .resolve("weather:city:delhi", 600, || counted_fetch(calls, json!({"temp": 99})))
            .await
            .unwrap();
        assert!(second.from_cache);
        assert_eq!(second.value, json!({"temp": 31}));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetches_again_after_ttl() {
        let (resolver, _) = resolver();
        let counter = AtomicUsize::new(0);
        let calls = &counter;

        for _ in 0..2 {
            resolver
                .resolve("news:latest news:general:en:1:20", 600, || {
                    counted_fetch(calls, json!([]))
                })
                .await
                .unwrap();
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        tokio::time::advance(Duration::from_secs(600)).await;

        let third = resolver
            .resolve("news:latest news:general:en:1:20", 600, || {
                counted_fetch(calls, json!([]))
            })
            .await
            .unwrap();
        assert!(!third.from_cache);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_normalized_city_keys_share_an_entry() {
        let (resolver, _) = resolver();
        let counter = AtomicUsize::new(0);
        let calls = &counter;

        let upper = CacheKey::current_weather(&WeatherQuery::City("DELHI".into()));
        resolver
            .resolve(upper.as_str(), 900, || counted_fetch(calls, json!({"name": "Delhi"})))
            .await
            .unwrap();

        let hit = resolver
            .resolve("weather:city:delhi", 900, || counted_fetch(calls, json!(null)))
            .await
            .unwrap();
        assert!(hit.from_cache);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_upstream_failure_is_not_cached() {
        let (resolver, cache) = resolver();
        let counter = AtomicUsize::new(0);
        let calls = &counter;

        let failing = || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err::<Value, _>(AppError::Upstream(UpstreamError::Timeout))
        };

        let err = resolver
            .resolve("weather:city:lima", 900, failing)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Upstream(UpstreamError::Timeout)));
        assert!(cache.is_empty());

        let again = resolver
            .resolve("weather:city:lima", 900, || counted_fetch(calls, json!({"ok": true})))
            .await
            .unwrap();
        assert!(!again.from_cache);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_concurrent_misses_each_fetch() {
        let (resolver, _) = resolver();
        let counter = AtomicUsize::new(0);
        let calls = &counter;

        let slow = || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            tokio::task::yield_now().await;
            Ok::<_, AppError>(json!({"city": "rome"}))
        };

        let (a, b) = tokio::join!(
            resolver.resolve("weather:city:rome", 900, slow),
            resolver.resolve("weather:city:rome", 900, slow),
        );
        assert!(!a.unwrap().from_cache);
        assert!(!b.unwrap().from_cache);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
