use axum::extract::State;
use axum::Json;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::api::AppState;
use crate::datasource::parse_trade_history;
use crate::domain::{Asset, Decimal, RawTradeRow, TimeMs, Trade};
use crate::engine::{
    compute_book_cost, compute_pnl, compute_unrealized, historical_positions, BookCost, PnlEvent,
    UnrealizedPosition,
};
use crate::error::AppError;
use crate::orchestration::LedgerReport;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerRequest {
    pub trades: Vec<RawTradeRow>,
    #[serde(default)]
    pub include_unrealized: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookCostResponse {
    pub trades: Vec<Trade>,
    pub book_cost: BookCost,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PnlResponse {
    pub realized: BTreeMap<Asset, Decimal>,
    pub total_realized: Decimal,
    pub events: BTreeMap<Asset, Vec<PnlEvent>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unrealized: Option<BTreeMap<Asset, UnrealizedPosition>>,
}

#[derive(Debug, Serialize)]
pub struct PositionsResponse {
    pub positions: BTreeMap<TimeMs, BTreeMap<Asset, Decimal>>,
}

fn require_trades(request: &LedgerRequest) -> Result<(), AppError> {
    if request.trades.is_empty() {
        return Err(AppError::BadRequest("trades must not be empty".to_string()));
    }
    Ok(())
}

pub async fn post_book_cost(
    State(state): State<AppState>,
    Json(request): Json<LedgerRequest>,
) -> Result<Json<BookCostResponse>, AppError> {
    require_trades(&request)?;
    let trades = state.reconstructor.settle_trades(&request.trades).await?;
    let book_cost = compute_book_cost(&trades, state.reconstructor.smoothing());
    Ok(Json(BookCostResponse { trades, book_cost }))
}

pub async fn post_pnl(
    State(state): State<AppState>,
    Json(request): Json<LedgerRequest>,
) -> Result<Json<PnlResponse>, AppError> {
    require_trades(&request)?;
    let trades = state.reconstructor.settle_trades(&request.trades).await?;
    let book_cost = compute_book_cost(&trades, state.reconstructor.smoothing());
    let pnl = compute_pnl(&book_cost, &trades);

    let unrealized = if request.include_unrealized {
        let marks = mark_prices(&state, &book_cost).await;
        Some(compute_unrealized(&book_cost, &marks))
    } else {
        None
    };

    Ok(Json(PnlResponse {
        total_realized: pnl.total_realized(),
        realized: pnl.realized,
        events: pnl.events,
        unrealized,
    }))
}

/// Latest settlement price of every asset still held. Assets whose price
/// cannot be fetched are left out.
async fn mark_prices(state: &AppState, book_cost: &BookCost) -> BTreeMap<Asset, Decimal> {
    let resolver = state.quotes.resolver();
    let held: Vec<&Asset> = book_cost
        .assets
        .iter()
        .filter(|(_, series)| series.last().is_some_and(|p| !p.quantity.is_zero()))
        .map(|(asset, _)| asset)
        .collect();

    let lookups = held.iter().map(|asset| async move {
        if *asset == resolver.settlement() {
            return Some(Decimal::one());
        }
        let market = resolver.settlement_symbol(asset);
        match state.quotes.latest_price(&market).await {
            Ok(price) => price,
            Err(e) => {
                tracing::warn!("No mark price for {}: {}", market, e);
                None
            }
        }
    });

    held.iter()
        .zip(join_all(lookups).await)
        .filter_map(|(asset, mark)| mark.map(|m| ((*asset).clone(), m)))
        .collect()
}

pub async fn post_positions(
    State(state): State<AppState>,
    Json(request): Json<LedgerRequest>,
) -> Result<Json<PositionsResponse>, AppError> {
    require_trades(&request)?;
    let trades = state.reconstructor.settle_trades(&request.trades).await?;
    Ok(Json(PositionsResponse {
        positions: historical_positions(&trades),
    }))
}

/// Reconstruct a ledger from a raw trade-history CSV export.
pub async fn post_import_csv(
    State(state): State<AppState>,
    body: String,
) -> Result<Json<LedgerReport>, AppError> {
    let rows = parse_trade_history(body.as_bytes())?;
    if rows.is_empty() {
        return Err(AppError::BadRequest("CSV contains no trades".to_string()));
    }
    let report = state.reconstructor.reconstruct(&rows).await?;
    Ok(Json(report))
}
