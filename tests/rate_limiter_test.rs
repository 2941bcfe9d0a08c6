use basisbook::{Denied, RateLimitError, RateLimiter};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

#[tokio::test(start_paused = true)]
async fn test_total_cost_within_capacity_never_denied() {
    let limiter = RateLimiter::new("exchange", 1200, Duration::from_secs(60));
    for cost in [1u32, 2, 5, 10, 40, 100, 500, 542] {
        assert!(limiter.acquire(cost).await.is_ok(), "cost {} denied", cost);
    }
    assert!(limiter.available().await < 1.0);
}

#[tokio::test(start_paused = true)]
async fn test_denied_carries_retry_after() {
    let limiter = RateLimiter::new("exchange", 10, Duration::from_secs(10));
    limiter.acquire(10).await.unwrap();

    let Denied { retry_after } = limiter.acquire(3).await.unwrap_err();
    // 1 token per second, 3 missing.
    assert!(
        (retry_after.as_secs_f64() - 3.0).abs() < 0.01,
        "retry_after = {:?}",
        retry_after
    );
}

#[tokio::test(start_paused = true)]
async fn test_refill_is_monotonic_and_capped() {
    let limiter = RateLimiter::new("exchange", 100, Duration::from_secs(10));
    limiter.acquire(100).await.unwrap();

    tokio::time::advance(Duration::from_secs(2)).await;
    let after_2s = limiter.available().await;
    assert!(after_2s >= 20.0 - 1e-6, "available = {}", after_2s);

    tokio::time::advance(Duration::from_secs(3)).await;
    let after_5s = limiter.available().await;
    assert!(after_5s >= after_2s);
    assert!(after_5s >= 50.0 - 1e-6);

    tokio::time::advance(Duration::from_secs(60)).await;
    assert_eq!(limiter.available().await, 100.0);
}

#[tokio::test(start_paused = true)]
async fn test_wait_and_acquire_sleeps_until_refilled() {
    let limiter = RateLimiter::new("exchange", 10, Duration::from_secs(10));
    limiter.acquire(10).await.unwrap();

    let start = Instant::now();
    limiter.wait_and_acquire(5, None).await.unwrap();
    let waited = start.elapsed();
    assert!(waited >= Duration::from_secs(5), "waited {:?}", waited);
    assert!(waited < Duration::from_secs(6), "waited {:?}", waited);
}

#[tokio::test(start_paused = true)]
async fn test_wait_and_acquire_honours_deadline() {
    let limiter = RateLimiter::new("exchange", 10, Duration::from_secs(100));
    limiter.acquire(10).await.unwrap();

    let start = Instant::now();
    let err = limiter
        .wait_and_acquire(5, Some(start + Duration::from_secs(1)))
        .await
        .unwrap_err();

    assert!(matches!(err, RateLimitError::Exceeded { .. }));
    assert!(start.elapsed() < Duration::from_secs(1), "gave up immediately");
}

#[tokio::test(start_paused = true)]
async fn test_cost_above_capacity_never_succeeds() {
    let limiter = RateLimiter::new("exchange", 10, Duration::from_secs(1));
    let err = limiter.wait_and_acquire(11, None).await.unwrap_err();
    assert_eq!(
        err,
        RateLimitError::CostExceedsCapacity {
            cost: 11,
            capacity: 10.0
        }
    );
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_waiters_never_overdraw() {
    let limiter = Arc::new(RateLimiter::new("exchange", 10, Duration::from_secs(10)));

    let mut handles = Vec::new();
    for _ in 0..20 {
        let limiter = Arc::clone(&limiter);
        handles.push(tokio::spawn(async move {
            limiter.wait_and_acquire(1, None).await.unwrap();
            Instant::now()
        }));
    }

    let start = Instant::now();
    let mut finished = Vec::new();
    for handle in handles {
        finished.push(handle.await.unwrap());
    }

    // 10 burst immediately, the other 10 need ~10s of refill at 1 token/s.
    let late = finished
        .iter()
        .filter(|t| t.duration_since(start) >= Duration::from_millis(900))
        .count();
    assert!(late >= 10, "late = {}", late);
    let available = limiter.available().await;
    assert!((0.0..=10.0).contains(&available));
}
