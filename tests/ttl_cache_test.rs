use basisbook::{CacheBackend, SqliteCache, TtlCache};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

#[tokio::test(start_paused = true)]
async fn test_value_visible_until_ttl_then_miss() {
    let cache: TtlCache<i64> = TtlCache::default();
    cache.set("x", 42, Some(Duration::from_secs(1))).await.unwrap();
    assert_eq!(cache.get("x").await, Some(42));

    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert_eq!(cache.get("x").await, None);
    assert!(!cache.exists("x").await);
}

#[tokio::test(start_paused = true)]
async fn test_independent_expirations() {
    let cache: TtlCache<&'static str> = TtlCache::default();
    cache.set("short", "a", Some(Duration::from_secs(1))).await.unwrap();
    cache.set("long", "b", Some(Duration::from_secs(10))).await.unwrap();

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(cache.get("short").await, None);
    assert_eq!(cache.get("long").await, Some("b"));
}

#[tokio::test(start_paused = true)]
async fn test_reaper_runs_on_cleanup_interval_not_ttl() {
    let cache: TtlCache<i64> = TtlCache::new(Duration::from_secs(1), Duration::from_secs(60));
    cache.start().await;
    cache.set("x", 1, None).await.unwrap();

    // Expired but not yet swept.
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(cache.len().await, 1);

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(cache.len().await, 0);

    cache.stop().await;
    assert!(!cache.is_running().await);
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_writers_and_readers() {
    let cache = Arc::new(TtlCache::<usize>::default());

    let mut handles = Vec::new();
    for i in 0..50 {
        let cache = Arc::clone(&cache);
        handles.push(tokio::spawn(async move {
            cache.set(&format!("k{}", i % 10), i, None).await.unwrap();
            cache.get(&format!("k{}", (i + 1) % 10)).await
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let stats = cache.stats().await;
    assert_eq!(stats.entries, 10);
    assert_eq!(stats.sets, 50);
    assert_eq!(stats.total_requests, 50);
    assert_eq!(stats.hits + stats.misses, 50);
}

#[tokio::test(start_paused = true)]
async fn test_reset_stats_keeps_entries() {
    let cache: TtlCache<i64> = TtlCache::default();
    cache.set("x", 1, None).await.unwrap();
    cache.get("x").await;
    cache.get("y").await;

    let stats = cache.stats().await;
    assert_eq!(stats.hit_rate_percent, 50.0);

    cache.reset_stats().await;
    let stats = cache.stats().await;
    assert_eq!(stats.total_requests, 0);
    assert_eq!(stats.entries, 1);
}

async fn backends() -> (Vec<Arc<dyn CacheBackend>>, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir
        .path()
        .join("cache.db")
        .to_string_lossy()
        .to_string();
    let pool = basisbook::init_db(&db_path).await.expect("init_db failed");

    let memory: Arc<dyn CacheBackend> = Arc::new(TtlCache::<serde_json::Value>::default());
    let sqlite: Arc<dyn CacheBackend> =
        Arc::new(SqliteCache::new(
        pool,
        Duration::from_secs(300),
        Duration::from_secs(60),
    ));
    (vec![memory, sqlite], temp_dir)
}

#[tokio::test]
async fn test_backends_share_the_same_contract() {
    let (backends, _temp) = backends().await;
    for cache in backends {
        let name = cache.stats().await.backend;

        cache.set("a", json!({"close": "1.5"}), None).await.unwrap();
        cache
            .set("b", json!([1, 2]), Some(Duration::from_millis(30)))
            .await
            .unwrap();
        assert_eq!(cache.get("a").await.unwrap(), Some(json!({"close": "1.5"})), "{}", name);

        tokio::time::sleep(Duration::from_millis(80)).await;
        assert_eq!(cache.get("b").await.unwrap(), None, "{}", name);

        assert!(cache.delete("a").await.unwrap(), "{}", name);
        assert!(!cache.delete("a").await.unwrap(), "{}", name);
        assert!(cache.set("c", json!(1), Some(Duration::ZERO)).await.is_err(), "{}", name);

        cache.set("d", json!(1), None).await.unwrap();
        assert_eq!(cache.clear().await.unwrap(), 1, "{}", name);
    }
}
