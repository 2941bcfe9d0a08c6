//! Raw ledger rows and settled trades.

use super::{Asset, Decimal, Market, Side, TimeMs, ValidationError};
use serde::{Deserialize, Serialize};

/// One row of the exchange trade history, before any interpretation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawTradeRow {
    pub timestamp: TimeMs,
    pub market: String,
    pub side: Side,
    pub amount: Decimal,
    pub price: Decimal,
}

impl RawTradeRow {
    pub fn new(timestamp: TimeMs, market: &str, side: Side, amount: Decimal, price: Decimal) -> Self {
        Self {
            timestamp,
            market: market.to_string(),
            side,
            amount,
            price,
        }
    }

    /// Check the row-level invariants (`amount > 0`, `price > 0`).
    pub fn validate(&self) -> Result<(), ValidationError> {
        if !self.amount.is_positive() {
            return Err(ValidationError::NonPositiveAmount(
                self.amount.to_canonical_string(),
            ));
        }
        if !self.price.is_positive() {
            return Err(ValidationError::NonPositivePrice(
                self.price.to_canonical_string(),
            ));
        }
        Ok(())
    }
}

/// A trade with its settlement-currency valuation resolved.
///
/// Immutable once built; all derived ledgers are pure functions of a `Vec<Trade>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trade {
    /// Stable identifier, used as the final ordering tie-breaker.
    pub trade_key: String,
    pub timestamp: TimeMs,
    pub market: String,
    pub base: Asset,
    pub quote: Asset,
    pub side: Side,
    /// Quantity of base asset exchanged.
    pub amount: Decimal,
    /// Price of one base unit in quote units.
    pub price: Decimal,
    /// Value of one quote unit in the settlement currency at `timestamp`.
    pub quote_rate: Decimal,
    /// Value of one base unit in the settlement currency (`price * quote_rate`).
    pub settlement_price: Decimal,
}

impl Trade {
    /// Build a settled trade from a validated row and its resolved quote rate.
    pub fn settle(row: &RawTradeRow, market: Market, quote_rate: Decimal) -> Result<Self, ValidationError> {
        row.validate()?;
        if !quote_rate.is_positive() {
            return Err(ValidationError::NonPositiveQuoteRate {
                market: market.symbol,
                rate: quote_rate.to_canonical_string(),
            });
        }

        let trade_key = Self::compute_trade_key(
            row.timestamp,
            &market.symbol,
            row.side,
            &row.amount,
            &row.price,
        );

        Ok(Trade {
            trade_key,
            timestamp: row.timestamp,
            market: market.symbol,
            base: market.base,
            quote: market.quote,
            side: row.side,
            amount: row.amount,
            price: row.price,
            quote_rate,
            settlement_price: row.price * quote_rate,
        })
    }

    /// Hash of the row's identifying fields.
    pub fn compute_trade_key(
        timestamp: TimeMs,
        market: &str,
        side: Side,
        amount: &Decimal,
        price: &Decimal,
    ) -> String {
        use sha2::{Digest, Sha256};

        let mut hasher = Sha256::new();
        hasher.update(timestamp.as_ms().to_le_bytes());
        hasher.update(market.as_bytes());
        hasher.update(if side == Side::Buy { b"B" } else { b"S" });
        hasher.update(amount.to_canonical_string());
        hasher.update(b"@");
        hasher.update(price.to_canonical_string());
        let hash = hasher.finalize();
        format!("trade:{}", hex::encode(&hash[..16]))
    }

    /// Settlement value of the whole trade (`amount * settlement_price`).
    pub fn settlement_value(&self) -> Decimal {
        self.amount * self.settlement_price
    }
}
