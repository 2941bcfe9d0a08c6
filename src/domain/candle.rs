//! Typed candlestick (kline) records.

use super::{Decimal, TimeMs};
use serde::{Deserialize, Serialize};

/// One candle from the exchange kline endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candle {
    pub open_time: TimeMs,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
    pub close_time: TimeMs,
}

impl Candle {
    /// Candle with every price set to `close`. Mostly useful for fixtures.
    pub fn flat(open_time: TimeMs, close_time: TimeMs, close: Decimal) -> Self {
        Self {
            open_time,
            open: close,
            high: close,
            low: close,
            close,
            volume: Decimal::zero(),
            close_time,
        }
    }
}
