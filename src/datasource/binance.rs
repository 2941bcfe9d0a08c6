//! Binance spot REST kline source.

use super::{DataSourceError, KlineRequest, QuoteSource};
use crate::domain::{Candle, Decimal, TimeMs};
use backoff::future::retry;
use backoff::ExponentialBackoff;
use reqwest::Client;
use std::time::Duration;
use tokio::runtime::Handle;
use tracing::{debug, warn};

/// Binance kline source exposing a blocking interface.
///
/// Each call drives the HTTP request to completion on the captured runtime, so it
/// must run on a blocking thread, never directly on an async worker.
#[derive(Debug, Clone)]
pub struct BinanceQuoteSource {
    client: Client,
    base_url: String,
    runtime: Handle,
}

impl BinanceQuoteSource {
    pub fn new(base_url: String, runtime: Handle) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(10))
                .build()
                .unwrap_or_else(|_| Client::new()),
            base_url,
            runtime,
        }
    }

    fn klines_url(&self) -> String {
        format!("{}/api/v3/klines", self.base_url.trim_end_matches('/'))
    }

    async fn fetch_klines(
        &self,
        request: &KlineRequest,
    ) -> Result<Vec<serde_json::Value>, DataSourceError> {
        let url = self.klines_url();
        let mut query: Vec<(&str, String)> = vec![
            ("symbol", request.symbol.clone()),
            ("interval", request.interval.as_str().to_string()),
            ("startTime", request.start.as_ms().to_string()),
        ];
        if let Some(end) = request.end {
            query.push(("endTime", end.as_ms().to_string()));
        }
        if let Some(limit) = request.limit {
            query.push(("limit", limit.to_string()));
        }

        let backoff = ExponentialBackoff {
            max_elapsed_time: Some(Duration::from_secs(30)),
            ..Default::default()
        };

        retry(backoff, || async {
            let response = self
                .client
                .get(&url)
                .query(&query)
                .send()
                .await
                .map_err(|e| {
                    backoff::Error::transient(DataSourceError::NetworkError(e.to_string()))
                })?;

            let status = response.status();
            if status == 429 || status == 418 {
                return Err(backoff::Error::transient(DataSourceError::RateLimited));
            }
            if status.is_server_error() {
                return Err(backoff::Error::transient(DataSourceError::HttpError {
                    status: status.as_u16(),
                    message: "Server error".to_string(),
                }));
            }
            if !status.is_success() {
                let message = response.text().await.unwrap_or_default();
                return Err(backoff::Error::permanent(DataSourceError::HttpError {
                    status: status.as_u16(),
                    message,
                }));
            }

            response
                .json::<Vec<serde_json::Value>>()
                .await
                .map_err(|e| backoff::Error::permanent(DataSourceError::ParseError(e.to_string())))
        })
        .await
    }
}

impl QuoteSource for BinanceQuoteSource {
    fn klines(&self, request: &KlineRequest) -> Result<Vec<Candle>, DataSourceError> {
        debug!(
            "Fetching klines symbol={}, interval={}, start={}, limit={:?}",
            request.symbol,
            request.interval.as_str(),
            request.start,
            request.limit
        );

        let raw = self.runtime.block_on(self.fetch_klines(request))?;
        let mut candles = Vec::with_capacity(raw.len());
        for kline in &raw {
            match parse_kline(kline) {
                Ok(candle) => candles.push(candle),
                Err(e) => {
                    warn!("Rejecting malformed kline for {}: {}", request.symbol, e);
                    return Err(e);
                }
            }
        }
        Ok(candles)
    }
}

/// Validate one 12-element kline array into a [`Candle`].
///
/// Layout: `[open_time, open, high, low, close, volume, close_time, ...]`.
pub fn parse_kline(kline: &serde_json::Value) -> Result<Candle, DataSourceError> {
    let fields = kline
        .as_array()
        .ok_or_else(|| DataSourceError::ParseError("Expected kline array".to_string()))?;
    if fields.len() != 12 {
        return Err(DataSourceError::ParseError(format!(
            "Expected 12 kline elements, got {}",
            fields.len()
        )));
    }

    let time_at = |idx: usize, name: &str| -> Result<TimeMs, DataSourceError> {
        fields[idx]
            .as_i64()
            .map(TimeMs::new)
            .ok_or_else(|| DataSourceError::ParseError(format!("Invalid {} field", name)))
    };
    let decimal_at = |idx: usize, name: &str| -> Result<Decimal, DataSourceError> {
        let s = fields[idx]
            .as_str()
            .ok_or_else(|| DataSourceError::ParseError(format!("Missing {} field", name)))?;
        Decimal::from_str_canonical(s)
            .map_err(|e| DataSourceError::ParseError(format!("Invalid {}: {}", name, e)))
    };

    Ok(Candle {
        open_time: time_at(0, "open_time")?,
        open: decimal_at(1, "open")?,
        high: decimal_at(2, "high")?,
        low: decimal_at(3, "low")?,
        close: decimal_at(4, "close")?,
        volume: decimal_at(5, "volume")?,
        close_time: time_at(6, "close_time")?,
    })
}
