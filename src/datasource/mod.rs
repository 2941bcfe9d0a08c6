//! Data source abstraction for exchange quotes and raw trade ledgers.

use crate::domain::{Candle, TimeMs};
use std::fmt;

pub mod binance;
pub mod ledger_csv;
pub mod mock;

pub use binance::BinanceQuoteSource;
pub use ledger_csv::{parse_trade_history, LedgerReadError};
pub use mock::MockQuoteSource;

/// Candle width requested from the exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Interval {
    OneMinute,
    OneDay,
}

impl Interval {
    pub fn as_str(&self) -> &'static str {
        match self {
            Interval::OneMinute => "1m",
            Interval::OneDay => "1d",
        }
    }
}

/// Most candles the exchange returns for one kline call.
pub const MAX_KLINE_LIMIT: usize = 1000;

/// A kline query: candles on `symbol` opening at or after `start`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KlineRequest {
    pub symbol: String,
    pub interval: Interval,
    pub start: TimeMs,
    pub end: Option<TimeMs>,
    pub limit: Option<usize>,
}

impl KlineRequest {
    pub fn minutes(symbol: &str, start: TimeMs, limit: usize) -> Self {
        Self {
            symbol: symbol.to_string(),
            interval: Interval::OneMinute,
            start,
            end: None,
            limit: Some(limit),
        }
    }

    pub fn daily(symbol: &str, start: TimeMs, end: TimeMs) -> Self {
        Self {
            symbol: symbol.to_string(),
            interval: Interval::OneDay,
            start,
            end: Some(end),
            limit: Some(MAX_KLINE_LIMIT),
        }
    }
}

/// Exchange quote source.
///
/// Calls are **blocking** and latency-variable, the way the exchange SDK exposes
/// them; async callers must run them on the blocking pool (see
/// `OrchestrationClient::fetch_with_cache`).
pub trait QuoteSource: Send + Sync + fmt::Debug {
    /// Fetch candles ordered by open time.
    fn klines(&self, request: &KlineRequest) -> Result<Vec<Candle>, DataSourceError>;

    /// `count` one-minute candles on `market` opening at or after `start`.
    fn get_quote(
        &self,
        market: &str,
        start: TimeMs,
        count: usize,
    ) -> Result<Vec<Candle>, DataSourceError> {
        self.klines(&KlineRequest::minutes(market, start, count))
    }
}

/// Error type for data source operations.
#[derive(Debug, Clone)]
pub enum DataSourceError {
    /// Network error (e.g., connection timeout, DNS failure)
    NetworkError(String),
    /// HTTP error (e.g., 400 unknown symbol, 5xx server error)
    HttpError { status: u16, message: String },
    /// Malformed payload rejected at the boundary
    ParseError(String),
    /// Exchange-side rate limit (429/418)
    RateLimited,
    /// Other error
    Other(String),
}

impl fmt::Display for DataSourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataSourceError::NetworkError(msg) => write!(f, "Network error: {}", msg),
            DataSourceError::HttpError { status, message } => {
                write!(f, "HTTP error {}: {}", status, message)
            }
            DataSourceError::ParseError(msg) => write!(f, "Parse error: {}", msg),
            DataSourceError::RateLimited => write!(f, "Rate limited"),
            DataSourceError::Other(msg) => write!(f, "Error: {}", msg),
        }
    }
}

impl std::error::Error for DataSourceError {}
