//! SQLite-backed TTL cache with the same contract as the in-memory cache.

use super::{CacheBackend, CacheError, CacheStats};
use async_trait::async_trait;
use sqlx::sqlite::SqlitePool;
use sqlx::Row;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info};

const KEY_PREFIX: &str = "basisbook:";

#[derive(Debug, Default)]
struct Counters {
    hits: u64,
    misses: u64,
    sets: u64,
}

/// Durable cache stored in the `cache_entries` table.
///
/// Expiry is absolute wall-clock milliseconds, so entries survive restarts and
/// still expire on time. Rows nobody reads again are removed by the reaper
/// started with [`SqliteCache::start`].
#[derive(Debug)]
pub struct SqliteCache {
    pool: SqlitePool,
    default_ttl: Duration,
    cleanup_interval: Duration,
    counters: Mutex<Counters>,
    reaper: Mutex<Option<JoinHandle<()>>>,
}

impl SqliteCache {
    pub fn new(pool: SqlitePool, default_ttl: Duration, cleanup_interval: Duration) -> Self {
        info!(
            "SqliteCache initialized with default TTL {:?}, cleanup interval {:?}",
            default_ttl, cleanup_interval
        );
        Self {
            pool,
            default_ttl,
            cleanup_interval,
            counters: Mutex::new(Counters::default()),
            reaper: Mutex::new(None),
        }
    }

    /// Spawn the periodic `purge_expired` sweep. A no-op while already running.
    pub async fn start(&self) {
        let mut reaper = self.reaper.lock().await;
        if reaper.is_some() {
            return;
        }

        let pool = self.pool.clone();
        let interval = self.cleanup_interval;
        *reaper = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
            loop {
                ticker.tick().await;
                match delete_expired(&pool).await {
                    Ok(0) => {}
                    Ok(removed) => debug!("Cache cleanup: removed {} expired rows", removed),
                    Err(e) => error!("Cache cleanup failed: {}", e),
                }
            }
        }));
        info!("SqliteCache background cleanup task started");
    }

    /// Cancel the sweep and wait for the task to finish.
    pub async fn stop(&self) {
        let mut reaper = self.reaper.lock().await;
        let Some(handle) = reaper.take() else {
            return;
        };

        handle.abort();
        match handle.await {
            Ok(()) => {}
            Err(e) if e.is_cancelled() => {}
            Err(e) => error!("SqliteCache cleanup task failed: {}", e),
        }
        info!("SqliteCache background cleanup task stopped");
    }

    pub async fn is_running(&self) -> bool {
        self.reaper.lock().await.is_some()
    }

    fn key(key: &str) -> String {
        format!("{}{}", KEY_PREFIX, key)
    }

    fn now_ms() -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

#[async_trait]
impl CacheBackend for SqliteCache {
    async fn get(&self, key: &str) -> Result<Option<serde_json::Value>, CacheError> {
        let row = sqlx::query("SELECT value, expires_at_ms FROM cache_entries WHERE key = ?")
            .bind(Self::key(key))
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            self.counters.lock().await.misses += 1;
            debug!("Cache MISS: {}", key);
            return Ok(None);
        };

        let expires_at_ms: i64 = row.get("expires_at_ms");
        if Self::now_ms() >= expires_at_ms {
            sqlx::query("DELETE FROM cache_entries WHERE key = ?")
                .bind(Self::key(key))
                .execute(&self.pool)
                .await?;
            self.counters.lock().await.misses += 1;
            debug!("Cache MISS (expired): {}", key);
            return Ok(None);
        }

        let raw: String = row.get("value");
        let value = serde_json::from_str(&raw)?;
        self.counters.lock().await.hits += 1;
        debug!("Cache HIT: {}", key);
        Ok(Some(value))
    }

    async fn set(
        &self,
        key: &str,
        value: serde_json::Value,
        ttl: Option<Duration>,
    ) -> Result<(), CacheError> {
        let ttl = ttl.unwrap_or(self.default_ttl);
        let ttl_ms = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
        if ttl_ms <= 0 {
            return Err(CacheError::InvalidTtl);
        }

        let now = Self::now_ms();
        let raw = serde_json::to_string(&value)?;
        sqlx::query(
            r#"
            INSERT INTO cache_entries (key, value, created_at_ms, expires_at_ms)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                created_at_ms = excluded.created_at_ms,
                expires_at_ms = excluded.expires_at_ms
            "#,
        )
        .bind(Self::key(key))
        .bind(raw)
        .bind(now)
        .bind(now.saturating_add(ttl_ms))
        .execute(&self.pool)
        .await?;

        self.counters.lock().await.sets += 1;
        debug!("Cache SET: {} (TTL: {:?})", key, ttl);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, CacheError> {
        let result = sqlx::query("DELETE FROM cache_entries WHERE key = ?")
            .bind(Self::key(key))
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn clear(&self) -> Result<usize, CacheError> {
        let result = sqlx::query("DELETE FROM cache_entries WHERE key LIKE ?")
            .bind(format!("{}%", KEY_PREFIX))
            .execute(&self.pool)
            .await?;
        let count = result.rows_affected() as usize;
        info!("Cache cleared: {} entries removed", count);
        Ok(count)
    }

    async fn purge_expired(&self) -> Result<usize, CacheError> {
        delete_expired(&self.pool).await
    }

    async fn stats(&self) -> CacheStats {
        let entries = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM cache_entries WHERE key LIKE ?",
        )
        .bind(format!("{}%", KEY_PREFIX))
        .fetch_one(&self.pool)
        .await
        .unwrap_or(0);

        let counters = self.counters.lock().await;
        CacheStats::from_counters(
            "sqlite",
            usize::try_from(entries).unwrap_or(0),
            counters.hits,
            counters.misses,
            counters.sets,
        )
    }
}

impl Drop for SqliteCache {
    fn drop(&mut self) {
        if let Some(handle) = self.reaper.get_mut().take() {
            handle.abort();
        }
    }
}

async fn delete_expired(pool: &SqlitePool) -> Result<usize, CacheError> {
    let result = sqlx::query("DELETE FROM cache_entries WHERE key LIKE ? AND expires_at_ms <= ?")
        .bind(format!("{}%", KEY_PREFIX))
        .bind(SqliteCache::now_ms())
        .execute(pool)
        .await?;
    Ok(result.rows_affected() as usize)
}
