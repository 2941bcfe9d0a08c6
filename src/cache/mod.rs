//! TTL caching for exchange responses.
//!
//! Two interchangeable backends implement [`CacheBackend`]:
//! - [`TtlCache`]: in-memory map with lazy expiry and a background reaper
//! - [`SqliteCache`]: durable SQLite table with the same TTL contract

use async_trait::async_trait;
use serde::Serialize;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

pub mod memory;
pub mod sqlite;

pub use memory::TtlCache;
pub use sqlite::SqliteCache;

/// Keyed store with per-entry time-to-live.
///
/// Values are opaque JSON documents so every backend can persist them.
#[async_trait]
pub trait CacheBackend: Send + Sync + fmt::Debug {
    /// Fetch a live value. Expired entries behave as a miss and are evicted.
    async fn get(&self, key: &str) -> Result<Option<serde_json::Value>, CacheError>;

    /// Store a value. `None` uses the backend's default TTL.
    async fn set(
        &self,
        key: &str,
        value: serde_json::Value,
        ttl: Option<Duration>,
    ) -> Result<(), CacheError>;

    /// Remove a key, returning whether it existed.
    async fn delete(&self, key: &str) -> Result<bool, CacheError>;

    /// Remove every entry, returning how many were removed.
    async fn clear(&self) -> Result<usize, CacheError>;

    /// Evict all expired entries, returning how many were removed.
    async fn purge_expired(&self) -> Result<usize, CacheError>;

    async fn stats(&self) -> CacheStats;
}

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("ttl must be greater than zero")]
    InvalidTtl,
    #[error("cache backend error: {0}")]
    Backend(String),
    #[error("cache codec error: {0}")]
    Codec(String),
}

impl From<sqlx::Error> for CacheError {
    fn from(err: sqlx::Error) -> Self {
        CacheError::Backend(err.to_string())
    }
}

impl From<serde_json::Error> for CacheError {
    fn from(err: serde_json::Error) -> Self {
        CacheError::Codec(err.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub backend: &'static str,
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
    pub sets: u64,
    pub total_requests: u64,
    pub hit_rate_percent: f64,
}

impl CacheStats {
    pub(crate) fn from_counters(
        backend: &'static str,
        entries: usize,
        hits: u64,
        misses: u64,
        sets: u64,
    ) -> Self {
        let total_requests = hits + misses;
        let hit_rate_percent = if total_requests > 0 {
            ((hits as f64 / total_requests as f64) * 10_000.0).round() / 100.0
        } else {
            0.0
        };
        Self {
            backend,
            entries,
            hits,
            misses,
            sets,
            total_requests,
            hit_rate_percent,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hit_rate_rounded_to_two_places() {
        let stats = CacheStats::from_counters("memory", 1, 2, 1, 1);
        assert_eq!(stats.total_requests, 3);
        assert_eq!(stats.hit_rate_percent, 66.67);
    }

    #[test]
    fn test_hit_rate_without_requests() {
        let stats = CacheStats::from_counters("memory", 0, 0, 0, 0);
        assert_eq!(stats.hit_rate_percent, 0.0);
    }
}
