use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::api::AppState;
use crate::cache::CacheStats;
use crate::domain::TimeMs;
use crate::orchestration::BudgetStats;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
    pub timestamp: TimeMs,
    pub cache: CacheStats,
    pub budget: BudgetStats,
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        service: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
        timestamp: TimeMs::now(),
        cache: state.client.cache_stats().await,
        budget: state.client.budget_stats().await,
    })
}
