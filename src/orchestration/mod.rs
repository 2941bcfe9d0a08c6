//! External data orchestration and the reconstruction pipeline built on it.

pub mod client;
pub mod quotes;
pub mod reconstruct;

pub use client::{BudgetStats, FetchError, OrchestrationClient};
pub use quotes::{PriceTable, QuoteService, KLINE_WEIGHT};
pub use reconstruct::{LedgerReconstructor, LedgerReport};
