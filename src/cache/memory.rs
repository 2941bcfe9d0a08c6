//! In-memory TTL cache with a background reaper.

use super::{CacheBackend, CacheError, CacheStats};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info};

pub const DEFAULT_TTL: Duration = Duration::from_secs(300);
pub const DEFAULT_CLEANUP_INTERVAL: Duration = Duration::from_secs(60);

/// A cached value with its lifetime.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    pub value: V,
    pub created_at: Instant,
    pub expires_at: Instant,
}

impl<V> CacheEntry<V> {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

#[derive(Debug)]
struct State<V> {
    entries: HashMap<String, CacheEntry<V>>,
    hits: u64,
    misses: u64,
    sets: u64,
}

#[derive(Debug)]
struct Inner<V> {
    default_ttl: Duration,
    cleanup_interval: Duration,
    state: Mutex<State<V>>,
}

impl<V> Inner<V> {
    async fn remove_expired(&self) -> usize {
        let now = Instant::now();
        let mut state = self.state.lock().await;
        let before = state.entries.len();
        state.entries.retain(|_, entry| !entry.is_expired(now));
        before - state.entries.len()
    }
}

/// Keyed values with independent expirations.
///
/// Every mutation, including lazy eviction in [`TtlCache::get`] and the periodic
/// sweep, serializes through one mutex per instance.
#[derive(Debug)]
pub struct TtlCache<V> {
    inner: Arc<Inner<V>>,
    reaper: Mutex<Option<JoinHandle<()>>>,
}

impl<V> TtlCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    pub fn new(default_ttl: Duration, cleanup_interval: Duration) -> Self {
        info!(
            "TtlCache initialized with default TTL {:?}, cleanup interval {:?}",
            default_ttl, cleanup_interval
        );
        Self {
            inner: Arc::new(Inner {
                default_ttl,
                cleanup_interval,
                state: Mutex::new(State {
                    entries: HashMap::new(),
                    hits: 0,
                    misses: 0,
                    sets: 0,
                }),
            }),
            reaper: Mutex::new(None),
        }
    }

    /// Spawn the background sweep. Calling it again while running is a no-op.
    pub async fn start(&self) {
        let mut reaper = self.reaper.lock().await;
        if reaper.is_some() {
            return;
        }

        let inner = Arc::clone(&self.inner);
        let interval = inner.cleanup_interval;
        *reaper = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
            loop {
                ticker.tick().await;
                let removed = inner.remove_expired().await;
                if removed > 0 {
                    debug!("Cache cleanup: removed {} expired entries", removed);
                }
            }
        }));
        info!("TtlCache background cleanup task started");
    }

    /// Cancel the background sweep and wait for it to finish.
    ///
    /// Once this returns no further eviction happens except lazily in `get`.
    pub async fn stop(&self) {
        let mut reaper = self.reaper.lock().await;
        let Some(handle) = reaper.take() else {
            return;
        };

        handle.abort();
        match handle.await {
            Ok(()) => {}
            Err(e) if e.is_cancelled() => {}
            Err(e) => error!("TtlCache cleanup task failed: {}", e),
        }
        info!("TtlCache background cleanup task stopped");
    }

    pub async fn is_running(&self) -> bool {
        self.reaper.lock().await.is_some()
    }

    pub async fn get(&self, key: &str) -> Option<V> {
        let now = Instant::now();
        let mut state = self.inner.state.lock().await;

        let lookup = state.entries.get(key).map(|entry| {
            if entry.is_expired(now) {
                None
            } else {
                Some((entry.value.clone(), now - entry.created_at))
            }
        });

        match lookup {
            Some(Some((value, age))) => {
                state.hits += 1;
                debug!("Cache HIT: {} (age: {:.1}s)", key, age.as_secs_f64());
                Some(value)
            }
            Some(None) => {
                state.entries.remove(key);
                state.misses += 1;
                debug!("Cache MISS (expired): {}", key);
                None
            }
            None => {
                state.misses += 1;
                debug!("Cache MISS: {}", key);
                None
            }
        }
    }

    /// Store `value` under `key`; `None` uses the default TTL.
    pub async fn set(&self, key: &str, value: V, ttl: Option<Duration>) -> Result<(), CacheError> {
        let ttl = ttl.unwrap_or(self.inner.default_ttl);
        if ttl.is_zero() {
            return Err(CacheError::InvalidTtl);
        }

        let now = Instant::now();
        let entry = CacheEntry {
            value,
            created_at: now,
            expires_at: now + ttl,
        };

        let mut state = self.inner.state.lock().await;
        state.entries.insert(key.to_string(), entry);
        state.sets += 1;
        drop(state);

        debug!("Cache SET: {} (TTL: {:?})", key, ttl);
        Ok(())
    }

    pub async fn delete(&self, key: &str) -> bool {
        let existed = self.inner.state.lock().await.entries.remove(key).is_some();
        if existed {
            debug!("Cache DELETE: {}", key);
        }
        existed
    }

    pub async fn clear(&self) -> usize {
        let mut state = self.inner.state.lock().await;
        let count = state.entries.len();
        state.entries.clear();
        drop(state);

        info!("Cache cleared: {} entries removed", count);
        count
    }

    /// Whether a live value exists. Counts as a lookup in the stats.
    pub async fn exists(&self, key: &str) -> bool {
        self.get(key).await.is_some()
    }

    /// Number of stored entries, including expired ones not yet evicted.
    pub async fn len(&self) -> usize {
        self.inner.state.lock().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn purge_expired(&self) -> usize {
        self.inner.remove_expired().await
    }

    pub async fn stats(&self) -> CacheStats {
        let state = self.inner.state.lock().await;
        CacheStats::from_counters(
            "memory",
            state.entries.len(),
            state.hits,
            state.misses,
            state.sets,
        )
    }

    pub async fn reset_stats(&self) {
        let mut state = self.inner.state.lock().await;
        state.hits = 0;
        state.misses = 0;
        state.sets = 0;
    }
}

impl<V> Drop for TtlCache<V> {
    fn drop(&mut self) {
        if let Some(handle) = self.reaper.get_mut().take() {
            handle.abort();
        }
    }
}

impl<V> Default for TtlCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new(DEFAULT_TTL, DEFAULT_CLEANUP_INTERVAL)
    }
}

#[async_trait]
impl CacheBackend for TtlCache<serde_json::Value> {
    async fn get(&self, key: &str) -> Result<Option<serde_json::Value>, CacheError> {
        Ok(TtlCache::get(self, key).await)
    }

    async fn set(
        &self,
        key: &str,
        value: serde_json::Value,
        ttl: Option<Duration>,
    ) -> Result<(), CacheError> {
        TtlCache::set(self, key, value, ttl).await
    }

    async fn delete(&self, key: &str) -> Result<bool, CacheError> {
        Ok(TtlCache::delete(self, key).await)
    }

    async fn clear(&self) -> Result<usize, CacheError> {
        Ok(TtlCache::clear(self).await)
    }

    async fn purge_expired(&self) -> Result<usize, CacheError> {
        Ok(TtlCache::purge_expired(self).await)
    }

    async fn stats(&self) -> CacheStats {
        TtlCache::stats(self).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache() -> TtlCache<i32> {
        TtlCache::new(Duration::from_secs(300), Duration::from_secs(60))
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_then_get_before_and_after_ttl() {
        let cache = cache();
        cache.set("x", 42, Some(Duration::from_secs(1))).await.unwrap();
        assert_eq!(cache.get("x").await, Some(42));

        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert_eq!(cache.get("x").await, None);
        assert_eq!(cache.len().await, 0, "expired entry is evicted lazily");
    }

    #[tokio::test(start_paused = true)]
    async fn test_default_ttl_applies() {
        let cache = TtlCache::new(Duration::from_secs(2), Duration::from_secs(60));
        cache.set("k", 1, None).await.unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(cache.get("k").await, Some(1));
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(cache.get("k").await, None);
    }

    #[tokio::test]
    async fn test_zero_ttl_rejected() {
        let cache = cache();
        let err = cache.set("k", 1, Some(Duration::ZERO)).await.unwrap_err();
        assert!(matches!(err, CacheError::InvalidTtl));
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_delete_and_clear() {
        let cache = cache();
        cache.set("a", 1, None).await.unwrap();
        cache.set("b", 2, None).await.unwrap();

        assert!(cache.delete("a").await);
        assert!(!cache.delete("a").await);
        assert_eq!(cache.clear().await, 1);
        assert_eq!(cache.clear().await, 0);
    }

    #[tokio::test]
    async fn test_stats_track_hits_misses_sets() {
        let cache = cache();
        cache.set("a", 1, None).await.unwrap();
        cache.get("a").await;
        cache.get("a").await;
        cache.get("missing").await;

        let stats = cache.stats().await;
        assert_eq!(stats.entries, 1);
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.sets, 1);
        assert_eq!(stats.hit_rate_percent, 66.67);

        cache.reset_stats().await;
        assert_eq!(cache.stats().await.total_requests, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reaper_sweeps_unread_entries() {
        let cache = TtlCache::new(Duration::from_secs(1), Duration::from_secs(5));
        cache.start().await;
        cache.set("a", 1, None).await.unwrap();
        cache.set("b", 2, Some(Duration::from_secs(60))).await.unwrap();

        tokio::time::sleep(Duration::from_secs(6)).await;
        assert_eq!(cache.len().await, 1);

        cache.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_stop_idempotent() {
        let cache = cache();
        cache.start().await;
        cache.start().await;
        assert!(cache.is_running().await);

        cache.stop().await;
        cache.stop().await;
        assert!(!cache.is_running().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_sweep_after_stop() {
        let cache = TtlCache::new(Duration::from_secs(1), Duration::from_secs(5));
        cache.start().await;
        cache.stop().await;

        cache.set("a", 1, None).await.unwrap();
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(cache.len().await, 1, "expired but unread entry stays after stop");
    }
}
