pub mod api;
pub mod cache;
pub mod config;
pub mod datasource;
pub mod db;
pub mod domain;
pub mod engine;
pub mod error;
pub mod orchestration;
pub mod ratelimit;

pub use cache::{CacheBackend, CacheError, CacheStats, SqliteCache, TtlCache};
pub use config::Config;
pub use datasource::{BinanceQuoteSource, DataSourceError, MockQuoteSource, QuoteSource};
pub use db::init_db;
pub use domain::{Asset, Candle, Decimal, Market, MarketResolver, RawTradeRow, Side, TimeMs, Trade};
pub use engine::{BasisSmoothing, ReconstructError};
pub use error::AppError;
pub use orchestration::{FetchError, LedgerReconstructor, OrchestrationClient, QuoteService};
pub use ratelimit::{Denied, RateLimitError, RateLimiter};
