use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Not enough budget right now; retry after the given delay.
///
/// A flow-control signal returned by [`RateLimiter::acquire`], not a failure.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Denied {
    pub retry_after: Duration,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RateLimitError {
    /// The caller's deadline passes before enough budget refills.
    #[error("rate limit exceeded, retry after {:.2}s", .retry_after.as_secs_f64())]
    Exceeded { retry_after: Duration },
    /// The request costs more than the bucket can ever hold.
    #[error("cost {cost} exceeds limiter capacity {capacity}")]
    CostExceedsCapacity { cost: u32, capacity: f64 },
}

#[derive(Debug)]
struct Bucket {
    available: f64,
    last_refill: Instant,
}

/// Token bucket: bursts up to `capacity`, then refills at `capacity / period` per second.
///
/// Refill and consumption happen under a single async mutex, so concurrent
/// acquisitions always observe a consistent `available`.
#[derive(Debug)]
pub struct RateLimiter {
    name: String,
    capacity: f64,
    period: Duration,
    bucket: Mutex<Bucket>,
}

impl RateLimiter {
    /// # Panics
    /// Panics if `capacity` is not positive or `period` is zero.
    pub fn new(name: impl Into<String>, capacity: u32, period: Duration) -> Self {
        assert!(capacity > 0, "rate limiter capacity must be positive");
        assert!(!period.is_zero(), "rate limiter period must be non-zero");

        let name = name.into();
        info!(
            "RateLimiter '{}' initialized: {} calls per {:?}",
            name, capacity, period
        );
        Self {
            name,
            capacity: f64::from(capacity),
            period,
            bucket: Mutex::new(Bucket {
                available: f64::from(capacity),
                last_refill: Instant::now(),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn capacity(&self) -> f64 {
        self.capacity
    }

    fn refill_rate(&self) -> f64 {
        self.capacity / self.period.as_secs_f64()
    }

    fn refill(&self, bucket: &mut Bucket) {
        let now = Instant::now();
        let elapsed = now.saturating_duration_since(bucket.last_refill);
        bucket.available =
            (bucket.available + elapsed.as_secs_f64() * self.refill_rate()).min(self.capacity);
        bucket.last_refill = now;
    }

    /// Try to take `cost` tokens without waiting.
    pub async fn acquire(&self, cost: u32) -> Result<(), Denied> {
        let cost = f64::from(cost);
        let mut bucket = self.bucket.lock().await;
        self.refill(&mut bucket);

        if bucket.available >= cost {
            bucket.available -= cost;
            debug!(
                "RateLimiter '{}': acquired {} token(s), remaining {:.2}/{}",
                self.name, cost, bucket.available, self.capacity
            );
            return Ok(());
        }

        let needed = cost - bucket.available;
        let retry_after = Duration::from_secs_f64(needed / self.refill_rate());
        warn!(
            "RateLimiter '{}': budget exhausted, need {:.2} more token(s), retry in {:.2}s",
            self.name,
            needed,
            retry_after.as_secs_f64()
        );
        Err(Denied { retry_after })
    }

    /// Wait until `cost` tokens are available, then take them.
    ///
    /// Only the calling task is suspended. With a `deadline`, gives up as soon as the
    /// next retry would land past it instead of sleeping in vain.
    pub async fn wait_and_acquire(
        &self,
        cost: u32,
        deadline: Option<Instant>,
    ) -> Result<(), RateLimitError> {
        if f64::from(cost) > self.capacity {
            return Err(RateLimitError::CostExceedsCapacity {
                cost,
                capacity: self.capacity,
            });
        }

        loop {
            let Denied { retry_after } = match self.acquire(cost).await {
                Ok(()) => return Ok(()),
                Err(denied) => denied,
            };

            if let Some(deadline) = deadline {
                if Instant::now() + retry_after > deadline {
                    return Err(RateLimitError::Exceeded { retry_after });
                }
            }

            info!(
                "RateLimiter '{}': waiting {:.2}s before retry",
                self.name,
                retry_after.as_secs_f64()
            );
            tokio::time::sleep(retry_after).await;
        }
    }

    /// Tokens currently available, after applying any pending refill.
    pub async fn available(&self) -> f64 {
        let mut bucket = self.bucket.lock().await;
        self.refill(&mut bucket);
        bucket.available
    }

    /// Restore the bucket to full capacity.
    pub async fn reset(&self) {
        let mut bucket = self.bucket.lock().await;
        bucket.available = self.capacity;
        bucket.last_refill = Instant::now();
        info!("RateLimiter '{}' reset to full capacity", self.name);
    }
}
