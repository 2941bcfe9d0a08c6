//! Stable trade ordering for deterministic ledger reconstruction.

use crate::domain::Trade;

/// Ordering: timestamp -> trade_key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct TradeOrderingKey {
    pub timestamp_ms: i64,
    pub trade_key: String,
}

impl TradeOrderingKey {
    pub fn from_trade(trade: &Trade) -> Self {
        TradeOrderingKey {
            timestamp_ms: trade.timestamp.as_ms(),
            trade_key: trade.trade_key.clone(),
        }
    }
}

/// Sort trades deterministically, independent of input order.
pub fn sort_trades_deterministic(trades: &mut [Trade]) {
    trades.sort_by_cached_key(TradeOrderingKey::from_trade);
}
