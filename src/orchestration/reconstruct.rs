//! End-to-end ledger reconstruction: raw rows to book cost and P&L.

use super::quotes::QuoteService;
use crate::domain::{
    ordering::sort_trades_deterministic, Candle, Decimal, Market, RawTradeRow, TimeMs, Trade,
};
use crate::engine::{
    compute_book_cost, compute_pnl, interpolate_quote_rate, quote_window_start, BasisSmoothing,
    BookCost, PnlReport, ReconstructError, QUOTE_WINDOW_CANDLES,
};
use futures::future::try_join_all;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerReport {
    pub trades: Vec<Trade>,
    pub book_cost: BookCost,
    pub pnl: PnlReport,
}

#[derive(Debug, Clone)]
pub struct LedgerReconstructor {
    quotes: Arc<QuoteService>,
    smoothing: BasisSmoothing,
}

impl LedgerReconstructor {
    pub fn new(quotes: Arc<QuoteService>, smoothing: BasisSmoothing) -> Self {
        Self { quotes, smoothing }
    }

    pub fn smoothing(&self) -> BasisSmoothing {
        self.smoothing
    }

    /// Validate rows and resolve each one's settlement price.
    ///
    /// Each distinct quote window is fetched once, concurrently with the others.
    /// Any failure aborts the whole batch.
    pub async fn settle_trades(&self, rows: &[RawTradeRow]) -> Result<Vec<Trade>, ReconstructError> {
        let resolver = self.quotes.resolver();
        let markets = rows
            .iter()
            .map(|row| {
                row.validate()?;
                Ok(resolver.resolve(&row.market)?)
            })
            .collect::<Result<Vec<Market>, ReconstructError>>()?;

        let windows: BTreeSet<(String, TimeMs)> = rows
            .iter()
            .zip(&markets)
            .filter(|(_, market)| !resolver.is_settlement_quoted(market))
            .map(|(row, market)| {
                (
                    resolver.settlement_symbol(&market.quote),
                    quote_window_start(row.timestamp),
                )
            })
            .collect();

        let fetched = try_join_all(windows.into_iter().map(|(rate_market, start)| async move {
            let candles = self
                .quotes
                .get_quote(&rate_market, start, QUOTE_WINDOW_CANDLES)
                .await?;
            Ok::<_, ReconstructError>(((rate_market, start), candles))
        }))
        .await?;
        let candles: HashMap<(String, TimeMs), Vec<Candle>> = fetched.into_iter().collect();
        debug!(
            "Resolved {} quote window(s) for {} row(s)",
            candles.len(),
            rows.len()
        );

        let mut trades = rows
            .iter()
            .zip(markets)
            .map(|(row, market)| self.settle_one(row, market, &candles))
            .collect::<Result<Vec<Trade>, ReconstructError>>()?;

        sort_trades_deterministic(&mut trades);
        Ok(trades)
    }

    fn settle_one(
        &self,
        row: &RawTradeRow,
        market: Market,
        candles: &HashMap<(String, TimeMs), Vec<Candle>>,
    ) -> Result<Trade, ReconstructError> {
        let resolver = self.quotes.resolver();
        let quote_rate = if resolver.is_settlement_quoted(&market) {
            Decimal::one()
        } else {
            let rate_market = resolver.settlement_symbol(&market.quote);
            let window = candles
                .get(&(rate_market.clone(), quote_window_start(row.timestamp)))
                .map(Vec::as_slice)
                .unwrap_or(&[]);
            interpolate_quote_rate(&rate_market, row.timestamp, window)?
        };
        Ok(Trade::settle(row, market, quote_rate)?)
    }

    /// Settle every row, then compute book cost and realized P&L.
    pub async fn reconstruct(&self, rows: &[RawTradeRow]) -> Result<LedgerReport, ReconstructError> {
        let trades = self.settle_trades(rows).await?;
        let book_cost = compute_book_cost(&trades, self.smoothing);
        let pnl = compute_pnl(&book_cost, &trades);

        info!(
            "Reconstructed ledger: {} trade(s), {} asset(s), realized total {}",
            trades.len(),
            book_cost.assets.len(),
            pnl.total_realized()
        );
        Ok(LedgerReport {
            trades,
            book_cost,
            pnl,
        })
    }
}
