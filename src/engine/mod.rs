//! Pure computation engine for ledger reconstruction.
//!
//! Every function here is deterministic over its inputs: trades are processed in
//! `(timestamp, trade_key)` order and results are keyed by `BTreeMap`.

use crate::domain::{TimeMs, ValidationError};
use crate::orchestration::FetchError;
use thiserror::Error;

pub mod book_cost;
pub mod flows;
pub mod pnl;
pub mod positions;
pub mod settlement;

pub use book_cost::{compute_book_cost, BasisSmoothing, BookCost, BookCostPoint};
pub use flows::{aggregate_flows, decompose_trade, AssetFlowPoint, Flow};
pub use pnl::{compute_pnl, compute_unrealized, PnlEvent, PnlReport, UnrealizedPosition};
pub use positions::historical_positions;
pub use settlement::{interpolate_quote_rate, quote_window_start, QUOTE_WINDOW_CANDLES};

#[derive(Debug, Error)]
pub enum ReconstructError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// Not enough candles to bracket the trade; retryable once data is available.
    #[error("missing quotes for {market} at {timestamp}: got {found} candle(s)")]
    MissingQuotes {
        market: String,
        timestamp: TimeMs,
        found: usize,
    },
    #[error(transparent)]
    Fetch(#[from] FetchError),
}
