//! Rate-limited, cached access to the exchange.

use crate::cache::{CacheBackend, CacheError, CacheStats};
use crate::ratelimit::{RateLimitError, RateLimiter};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("rate limit exceeded for {key}: {source}")]
    RateLimitExceeded {
        key: String,
        #[source]
        source: RateLimitError,
    },
    #[error("external API call failed for {key}: {source}")]
    ExternalApi {
        key: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    #[error(transparent)]
    Cache(#[from] CacheError),
}

impl FetchError {
    pub fn key(&self) -> Option<&str> {
        match self {
            FetchError::RateLimitExceeded { key, .. } | FetchError::ExternalApi { key, .. } => {
                Some(key)
            }
            FetchError::Cache(_) => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BudgetStats {
    pub available_weight: f64,
    pub max_weight: f64,
}

/// The single path through which external data flows.
///
/// Owns the rate limiter and a handle to the cache. Blocking fetches run on the
/// blocking pool, at most `fetch_workers` at a time.
#[derive(Debug)]
pub struct OrchestrationClient {
    limiter: RateLimiter,
    cache: Arc<dyn CacheBackend>,
    workers: Arc<Semaphore>,
    max_wait: Duration,
}

impl OrchestrationClient {
    pub fn new(
        limiter: RateLimiter,
        cache: Arc<dyn CacheBackend>,
        fetch_workers: usize,
        max_wait: Duration,
    ) -> Self {
        let fetch_workers = fetch_workers.max(1);
        info!(
            "OrchestrationClient initialized: limiter={}, fetch_workers={}, max_wait={:?}",
            limiter.name(),
            fetch_workers,
            max_wait
        );
        Self {
            limiter,
            cache,
            workers: Arc::new(Semaphore::new(fetch_workers)),
            max_wait,
        }
    }

    /// Return the cached value for `key`, or run `fetch_fn` under the rate limit and
    /// cache its result for `ttl`.
    ///
    /// `fetch_fn` is a blocking call and is executed on the blocking pool. With
    /// `use_cache == false` the cache is not read but is still refreshed on success.
    /// Failures are never cached.
    pub async fn fetch_with_cache<T, E, F>(
        &self,
        key: &str,
        fetch_fn: F,
        cost: u32,
        ttl: Option<Duration>,
        use_cache: bool,
    ) -> Result<T, FetchError>
    where
        T: Serialize + DeserializeOwned + Send + 'static,
        E: std::error::Error + Send + Sync + 'static,
        F: FnOnce() -> Result<T, E> + Send + 'static,
    {
        if use_cache {
            if let Some(value) = self.cached::<T>(key).await {
                return Ok(value);
            }
        }

        let deadline = Instant::now() + self.max_wait;
        self.limiter
            .wait_and_acquire(cost, Some(deadline))
            .await
            .map_err(|source| {
                warn!("Rate limit exceeded for {}: {}", key, source);
                FetchError::RateLimitExceeded {
                    key: key.to_string(),
                    source,
                }
            })?;

        let external = |source: Box<dyn std::error::Error + Send + Sync>| {
            error!("External API call failed for {}: {}", key, source);
            FetchError::ExternalApi {
                key: key.to_string(),
                source,
            }
        };

        let permit = Arc::clone(&self.workers)
            .acquire_owned()
            .await
            .map_err(|e| external(Box::new(e)))?;

        // The permit moves into the worker so it is released only when the
        // blocking call returns, even if this future is dropped.
        let value = tokio::task::spawn_blocking(move || {
            let _permit = permit;
            fetch_fn()
        })
        .await
        .map_err(|e| external(Box::new(e)))?
        .map_err(|e| external(Box::new(e)))?;

        self.store(key, &value, ttl).await?;
        Ok(value)
    }

    async fn cached<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        match self.cache.get(key).await {
            Ok(Some(raw)) => match serde_json::from_value::<T>(raw) {
                Ok(value) => {
                    debug!("Serving {} from cache", key);
                    Some(value)
                }
                Err(e) => {
                    warn!("Discarding undecodable cache entry {}: {}", key, e);
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                error!("Cache read failed for {}: {}", key, e);
                None
            }
        }
    }

    async fn store<T: Serialize>(
        &self,
        key: &str,
        value: &T,
        ttl: Option<Duration>,
    ) -> Result<(), FetchError> {
        let raw = serde_json::to_value(value).map_err(CacheError::from)?;
        if let Err(e) = self.cache.set(key, raw, ttl).await {
            error!("Cache write failed for {}: {}", key, e);
        }
        Ok(())
    }

    /// Remaining rate-limit weight.
    pub async fn available_budget(&self) -> f64 {
        self.limiter.available().await
    }

    pub async fn budget_stats(&self) -> BudgetStats {
        BudgetStats {
            available_weight: self.limiter.available().await,
            max_weight: self.limiter.capacity(),
        }
    }

    pub async fn cache_stats(&self) -> CacheStats {
        self.cache.stats().await
    }

    pub async fn clear_cache(&self) -> Result<usize, CacheError> {
        self.cache.clear().await
    }

    pub fn cache(&self) -> &Arc<dyn CacheBackend> {
        &self.cache
    }

    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::TtlCache;
    use crate::datasource::DataSourceError;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn client(capacity: u32) -> OrchestrationClient {
        let cache: Arc<dyn CacheBackend> = Arc::new(TtlCache::<serde_json::Value>::default());
        OrchestrationClient::new(
            RateLimiter::new("test", capacity, Duration::from_secs(3600)),
            cache,
            4,
            Duration::from_millis(50),
        )
    }

    #[tokio::test]
    async fn test_cache_hit_skips_fetch_and_budget() {
        let client = client(10);
        let calls = Arc::new(AtomicUsize::new(0));

        for _ in 0..2 {
            let calls = Arc::clone(&calls);
            let value: i64 = client
                .fetch_with_cache(
                    "k",
                    move || {
                        calls.fetch_add(1, Ordering::SeqCst);
                        Ok::<_, DataSourceError>(42)
                    },
                    3,
                    None,
                    true,
                )
                .await
                .unwrap();
            assert_eq!(value, 42);
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        let available = client.available_budget().await;
        assert!((7.0..7.1).contains(&available), "available = {}", available);
    }

    #[tokio::test]
    async fn test_use_cache_false_refetches_and_refreshes() {
        let client = client(10);
        client
            .cache()
            .set("k", json!(1), None)
            .await
            .unwrap();

        let value: i64 = client
            .fetch_with_cache("k", || Ok::<_, DataSourceError>(2), 1, None, false)
            .await
            .unwrap();
        assert_eq!(value, 2);
        assert_eq!(client.cache().get("k").await.unwrap(), Some(json!(2)));
    }

    #[tokio::test]
    async fn test_failure_is_not_cached() {
        let client = client(10);
        let err = client
            .fetch_with_cache::<i64, _, _>(
                "k",
                || Err(DataSourceError::NetworkError("down".to_string())),
                1,
                None,
                true,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::ExternalApi { .. }));
        assert_eq!(err.key(), Some("k"));
        assert_eq!(client.cache().get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_undecodable_cache_entry_is_a_miss() {
        let client = client(10);
        client
            .cache()
            .set("k", json!("not a number"), None)
            .await
            .unwrap();

        let value: i64 = client
            .fetch_with_cache("k", || Ok::<_, DataSourceError>(7), 1, None, true)
            .await
            .unwrap();
        assert_eq!(value, 7);
    }

    #[tokio::test]
    async fn test_rate_limit_exceeded_surfaces() {
        let client = client(2);
        let _: i64 = client
            .fetch_with_cache("a", || Ok::<_, DataSourceError>(1), 2, None, true)
            .await
            .unwrap();

        // Refill of 2 units/hour cannot satisfy the next call within 50ms.
        let err = client
            .fetch_with_cache::<i64, _, _>("b", || Ok::<_, DataSourceError>(1), 2, None, true)
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::RateLimitExceeded { .. }));
    }

    #[tokio::test]
    async fn test_budget_stats() {
        let client = client(10);
        let stats = client.budget_stats().await;
        assert_eq!(stats.max_weight, 10.0);
        assert!(stats.available_weight <= 10.0);
    }
}
