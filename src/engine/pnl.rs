use super::book_cost::BookCost;
use crate::domain::{ordering::sort_trades_deterministic, Asset, Decimal, Side, TimeMs, Trade};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Realized profit on one disposal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PnlEvent {
    pub asset: Asset,
    pub timestamp: TimeMs,
    pub trade_key: String,
    /// -1 for a disposal.
    pub flow_sign: i32,
    pub quantity: Decimal,
    /// Running average cost immediately before the disposal.
    pub average_cost: Decimal,
    /// Settlement price of one unit at the time of sale.
    pub sale_price: Decimal,
    pub realized: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PnlReport {
    pub realized: BTreeMap<Asset, Decimal>,
    pub events: BTreeMap<Asset, Vec<PnlEvent>>,
}

impl PnlReport {
    pub fn total_realized(&self) -> Decimal {
        self.realized.values().copied().sum()
    }
}

/// Realized P&L for every SELL: `(sale_price - average_before) * amount`.
///
/// Every asset present in `book_cost` gets a total, zero if it was never sold.
pub fn compute_pnl(book_cost: &BookCost, trades: &[Trade]) -> PnlReport {
    let mut ordered = trades.to_vec();
    sort_trades_deterministic(&mut ordered);

    let mut report = PnlReport {
        realized: book_cost
            .assets
            .keys()
            .map(|asset| (asset.clone(), Decimal::zero()))
            .collect(),
        events: BTreeMap::new(),
    };

    for trade in ordered.iter().filter(|t| t.side == Side::Sell) {
        let average_cost = book_cost
            .at(&trade.base, trade.timestamp)
            .map(|p| p.average_before)
            .unwrap_or_default();
        let realized = (trade.settlement_price - average_cost) * trade.amount;

        *report.realized.entry(trade.base.clone()).or_default() += realized;
        report
            .events
            .entry(trade.base.clone())
            .or_default()
            .push(PnlEvent {
                asset: trade.base.clone(),
                timestamp: trade.timestamp,
                trade_key: trade.trade_key.clone(),
                flow_sign: trade.side.sign(),
                quantity: trade.amount,
                average_cost,
                sale_price: trade.settlement_price,
                realized,
            });
    }

    report
}

/// Mark-to-market of an open position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnrealizedPosition {
    pub quantity: Decimal,
    pub average_cost: Decimal,
    pub mark: Decimal,
    pub unrealized: Decimal,
}

/// `(mark - average) * quantity` for every asset that has a mark price.
pub fn compute_unrealized(
    book_cost: &BookCost,
    marks: &BTreeMap<Asset, Decimal>,
) -> BTreeMap<Asset, UnrealizedPosition> {
    book_cost
        .assets
        .iter()
        .filter_map(|(asset, series)| {
            let last = series.last()?;
            let mark = *marks.get(asset)?;
            Some((
                asset.clone(),
                UnrealizedPosition {
                    quantity: last.quantity,
                    average_cost: last.average_after,
                    mark,
                    unrealized: (mark - last.average_after) * last.quantity,
                },
            ))
        })
        .collect()
}
