//! Domain types and determinism layer for the ledger.
//!
//! This module provides:
//! - Lossless numeric handling via Decimal wrapper
//! - Domain primitives: TimeMs, Asset, Side
//! - Explicit market symbol decomposition
//! - Raw ledger rows, settled trades and candles
//! - Stable trade ordering for deterministic processing

pub mod candle;
pub mod decimal;
pub mod market;
pub mod ordering;
pub mod primitives;
pub mod trade;
pub mod validation;

pub use candle::Candle;
pub use decimal::Decimal;
pub use market::{Market, MarketResolver};
pub use ordering::TradeOrderingKey;
pub use primitives::{Asset, Side, TimeMs};
pub use trade::{RawTradeRow, Trade};
pub use validation::ValidationError;
