use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::api::AppState;
use crate::cache::CacheStats;
use crate::domain::TimeMs;
use crate::error::AppError;
use crate::orchestration::{BudgetStats, PriceTable};

const DEFAULT_PRICE_WINDOW_MS: i64 = 30 * 86_400_000;

pub async fn get_budget(State(state): State<AppState>) -> Json<BudgetStats> {
    Json(state.client.budget_stats().await)
}

pub async fn get_cache_stats(State(state): State<AppState>) -> Json<CacheStats> {
    Json(state.client.cache_stats().await)
}

#[derive(Debug, Serialize)]
pub struct ClearCacheResponse {
    pub cleared: usize,
}

pub async fn clear_cache(State(state): State<AppState>) -> Result<Json<ClearCacheResponse>, AppError> {
    let cleared = state.client.clear_cache().await?;
    Ok(Json(ClearCacheResponse { cleared }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PricesQuery {
    pub symbols: String,
    pub from_ms: Option<i64>,
    pub to_ms: Option<i64>,
    pub use_cache: Option<bool>,
}

pub async fn get_prices(
    Query(params): Query<PricesQuery>,
    State(state): State<AppState>,
) -> Result<Json<PriceTable>, AppError> {
    let symbols: Vec<String> = params
        .symbols
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();
    if symbols.is_empty() {
        return Err(AppError::BadRequest("symbols must not be empty".to_string()));
    }

    let to = params.to_ms.map(TimeMs::new).unwrap_or_else(TimeMs::now);
    let from = params
        .from_ms
        .map(TimeMs::new)
        .unwrap_or_else(|| to.minus_ms(DEFAULT_PRICE_WINDOW_MS));
    if from > to {
        return Err(AppError::BadRequest("fromMs must be <= toMs".to_string()));
    }

    let table = state
        .quotes
        .get_daily_closes(&symbols, from, to, params.use_cache.unwrap_or(true))
        .await?;
    Ok(Json(table))
}
