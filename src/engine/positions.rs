use crate::domain::{ordering::sort_trades_deterministic, Asset, Decimal, TimeMs, Trade};
use std::collections::BTreeMap;

/// Cumulative base-asset holdings at the end of each trading day.
///
/// Trade times are rounded to the nearest UTC midnight. Each day carries every
/// asset traded so far, including ones that went flat.
pub fn historical_positions(trades: &[Trade]) -> BTreeMap<TimeMs, BTreeMap<Asset, Decimal>> {
    let mut ordered = trades.to_vec();
    sort_trades_deterministic(&mut ordered);

    let mut running: BTreeMap<Asset, Decimal> = BTreeMap::new();
    let mut days = BTreeMap::new();
    for trade in &ordered {
        let delta = Decimal::from_i64(i64::from(trade.side.sign())) * trade.amount;
        *running.entry(trade.base.clone()).or_default() += delta;
        days.insert(trade.timestamp.round_day(), running.clone());
    }
    days
}
