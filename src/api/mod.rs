pub mod health;
pub mod ledger;
pub mod market;

use crate::cache::CacheBackend;
use crate::config::Config;
use crate::datasource::QuoteSource;
use crate::orchestration::{LedgerReconstructor, OrchestrationClient, QuoteService};
use crate::ratelimit::RateLimiter;
use axum::{
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

#[derive(Clone)]
pub struct AppState {
    pub client: Arc<OrchestrationClient>,
    pub quotes: Arc<QuoteService>,
    pub reconstructor: Arc<LedgerReconstructor>,
}

impl AppState {
    pub fn new(
        client: Arc<OrchestrationClient>,
        quotes: Arc<QuoteService>,
        reconstructor: Arc<LedgerReconstructor>,
    ) -> Self {
        Self {
            client,
            quotes,
            reconstructor,
        }
    }

    /// Wire the limiter, client, quote service and reconstructor from config.
    pub fn build(
        config: &Config,
        source: Arc<dyn QuoteSource>,
        cache: Arc<dyn CacheBackend>,
    ) -> Self {
        let limiter = RateLimiter::new(
            "exchange",
            config.rate_limit_calls,
            config.rate_limit_period,
        );
        let client = Arc::new(OrchestrationClient::new(
            limiter,
            cache,
            config.fetch_workers,
            config.rate_limit_max_wait,
        ));
        let quotes = Arc::new(QuoteService::new(
            Arc::clone(&client),
            source,
            config.market_resolver(),
            config.cache_prices_ttl,
        ));
        let reconstructor = Arc::new(LedgerReconstructor::new(
            Arc::clone(&quotes),
            config.basis_smoothing,
        ));
        Self::new(client, quotes, reconstructor)
    }
}

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health::health))
        .route("/v1/budget", get(market::get_budget))
        .route("/v1/cache/stats", get(market::get_cache_stats))
        .route("/v1/cache", delete(market::clear_cache))
        .route("/v1/prices", get(market::get_prices))
        .route("/v1/ledger/book-cost", post(ledger::post_book_cost))
        .route("/v1/ledger/pnl", post(ledger::post_pnl))
        .route("/v1/ledger/positions", post(ledger::post_positions))
        .route("/v1/ledger/import", post(ledger::post_import_csv))
        .layer(cors)
        .with_state(state)
}
