//! Mock quote source for testing without network calls.

use super::{DataSourceError, Interval, KlineRequest, QuoteSource};
use crate::domain::{Candle, Decimal, TimeMs};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

const MINUTE_MS: i64 = 60_000;
const DAY_MS: i64 = 86_400_000;

/// Mock quote source that serves predefined candles.
///
/// Counts every call, can inject a number of transient failures before
/// succeeding, and can sleep to simulate a slow blocking SDK.
#[derive(Debug, Default)]
pub struct MockQuoteSource {
    candles: HashMap<(String, Interval), Vec<Candle>>,
    failing_symbols: HashSet<String>,
    failures_remaining: AtomicUsize,
    latency: Duration,
    calls: AtomicUsize,
}

impl MockQuoteSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add candles for `symbol` at `interval`. Kept sorted by open time.
    pub fn with_candles(mut self, symbol: &str, interval: Interval, candles: Vec<Candle>) -> Self {
        let series = self
            .candles
            .entry((symbol.to_string(), interval))
            .or_default();
        series.extend(candles);
        series.sort_by_key(|c| c.open_time);
        self
    }

    /// One-minute candles on `symbol`, the first opening at `first_open`.
    pub fn with_minute_closes(self, symbol: &str, first_open: TimeMs, closes: &[&str]) -> Self {
        let candles = series(first_open, MINUTE_MS, closes);
        self.with_candles(symbol, Interval::OneMinute, candles)
    }

    /// Daily candles on `symbol`, the first opening at `first_open`.
    pub fn with_daily_closes(self, symbol: &str, first_open: TimeMs, closes: &[&str]) -> Self {
        let candles = series(first_open, DAY_MS, closes);
        self.with_candles(symbol, Interval::OneDay, candles)
    }

    /// Every request for `symbol` fails with an HTTP 400.
    pub fn with_failing_symbol(mut self, symbol: &str) -> Self {
        self.failing_symbols.insert(symbol.to_string());
        self
    }

    /// The next `n` calls fail with a network error, whatever the symbol.
    pub fn with_transient_failures(self, n: usize) -> Self {
        self.failures_remaining.store(n, Ordering::SeqCst);
        self
    }

    /// Block the calling thread for `latency` on every call.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Number of calls served so far, including failed ones.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

fn series(first_open: TimeMs, step_ms: i64, closes: &[&str]) -> Vec<Candle> {
    closes
        .iter()
        .enumerate()
        .map(|(i, close)| {
            let open_time = first_open.as_ms() + step_ms * i as i64;
            let close = Decimal::from_str_canonical(close).unwrap_or_else(|_| Decimal::zero());
            Candle::flat(
                TimeMs::new(open_time),
                TimeMs::new(open_time + step_ms - 1),
                close,
            )
        })
        .collect()
}

impl QuoteSource for MockQuoteSource {
    fn klines(&self, request: &KlineRequest) -> Result<Vec<Candle>, DataSourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if !self.latency.is_zero() {
            std::thread::sleep(self.latency);
        }

        let injected = self
            .failures_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if injected {
            return Err(DataSourceError::NetworkError(
                "injected transient failure".to_string(),
            ));
        }

        if self.failing_symbols.contains(&request.symbol) {
            return Err(DataSourceError::HttpError {
                status: 400,
                message: format!("Invalid symbol {}", request.symbol),
            });
        }

        let Some(series) = self
            .candles
            .get(&(request.symbol.clone(), request.interval))
        else {
            return Ok(Vec::new());
        };

        let limit = request.limit.unwrap_or(usize::MAX);
        Ok(series
            .iter()
            .filter(|c| {
                c.open_time >= request.start && request.end.map_or(true, |end| c.open_time <= end)
            })
            .take(limit)
            .cloned()
            .collect())
    }
}
