use crate::domain::{Asset, Decimal, Side, TimeMs, Trade};
use std::collections::BTreeMap;

/// Signed movement of one asset caused by a trade.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Flow {
    pub asset: Asset,
    pub timestamp: TimeMs,
    pub quantity: Decimal,
    /// Settlement-currency value of `quantity`.
    pub settlement: Decimal,
}

/// Net flows of one asset at one timestamp, with running totals.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetFlowPoint {
    pub timestamp: TimeMs,
    pub quantity: Decimal,
    pub settlement: Decimal,
    pub cumulative_quantity: Decimal,
    pub cumulative_settlement: Decimal,
}

impl AssetFlowPoint {
    /// Running average cost after this point; 0 over a flat position.
    pub fn average_cost(&self) -> Decimal {
        self.cumulative_settlement.safe_div(self.cumulative_quantity)
    }
}

/// Split a trade into its base and quote legs.
///
/// A BUY adds base and spends quote; a SELL the reverse. Both legs carry the
/// same settlement value with opposite signs.
pub fn decompose_trade(trade: &Trade) -> [Flow; 2] {
    let sign = match trade.side {
        Side::Buy => Decimal::one(),
        Side::Sell => -Decimal::one(),
    };
    let base_settlement = sign * trade.amount * trade.settlement_price;
    let quote_settlement = -base_settlement;

    [
        Flow {
            asset: trade.base.clone(),
            timestamp: trade.timestamp,
            quantity: sign * trade.amount,
            settlement: base_settlement,
        },
        Flow {
            asset: trade.quote.clone(),
            timestamp: trade.timestamp,
            quantity: quote_settlement.safe_div(trade.quote_rate),
            settlement: quote_settlement,
        },
    ]
}

/// Per-asset flow series: grouped by timestamp, chronological, cumulatively summed.
pub fn aggregate_flows(trades: &[Trade]) -> BTreeMap<Asset, Vec<AssetFlowPoint>> {
    let mut grouped: BTreeMap<Asset, BTreeMap<TimeMs, (Decimal, Decimal)>> = BTreeMap::new();
    for flow in trades.iter().flat_map(decompose_trade) {
        let slot = grouped
            .entry(flow.asset)
            .or_default()
            .entry(flow.timestamp)
            .or_default();
        slot.0 += flow.quantity;
        slot.1 += flow.settlement;
    }

    grouped
        .into_iter()
        .map(|(asset, by_time)| {
            let mut cumulative_quantity = Decimal::zero();
            let mut cumulative_settlement = Decimal::zero();
            let series = by_time
                .into_iter()
                .map(|(timestamp, (quantity, settlement))| {
                    cumulative_quantity += quantity;
                    cumulative_settlement += settlement;
                    AssetFlowPoint {
                        timestamp,
                        quantity,
                        settlement,
                        cumulative_quantity,
                        cumulative_settlement,
                    }
                })
                .collect();
            (asset, series)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{MarketResolver, RawTradeRow};

    fn d(s: &str) -> Decimal {
        Decimal::from_str_canonical(s).unwrap()
    }

    fn trade(ts: i64, market: &str, side: Side, amount: &str, price: &str, rate: &str) -> Trade {
        let row = RawTradeRow::new(TimeMs::new(ts), market, side, d(amount), d(price));
        let market = MarketResolver::default().resolve(market).unwrap();
        Trade::settle(&row, market, d(rate)).unwrap()
    }

    #[test]
    fn test_cross_pair_buy_legs() {
        let t = trade(1_000, "ETHBTC", Side::Buy, "1", "0.05", "40000");
        let [base, quote] = decompose_trade(&t);

        assert_eq!(base.asset, Asset::new("ETH"));
        assert_eq!(base.quantity, d("1"));
        assert_eq!(base.settlement, d("2000"));
        assert_eq!(quote.asset, Asset::new("BTC"));
        assert_eq!(quote.quantity, d("-0.05"));
        assert_eq!(quote.settlement, d("-2000"));
    }

    #[test]
    fn test_sell_legs_reverse_signs() {
        let t = trade(1_000, "ETHUSDT", Side::Sell, "0.5", "2500", "1");
        let [base, quote] = decompose_trade(&t);
        assert_eq!(base.quantity, d("-0.5"));
        assert_eq!(base.settlement, d("-1250"));
        assert_eq!(quote.quantity, d("1250"));
        assert_eq!(quote.settlement, d("1250"));
    }

    #[test]
    fn test_same_timestamp_is_grouped() {
        let trades = vec![
            trade(2_000, "ETHUSDT", Side::Buy, "2", "1000", "1"),
            trade(1_000, "ETHUSDT", Side::Buy, "1", "2000", "1"),
            trade(2_000, "ETHUSDT", Side::Sell, "1", "1500", "1"),
        ];
        let flows = aggregate_flows(&trades);
        let eth = &flows[&Asset::new("ETH")];

        assert_eq!(eth.len(), 2);
        assert_eq!(eth[0].timestamp, TimeMs::new(1_000));
        assert_eq!(eth[1].quantity, d("1"));
        assert_eq!(eth[1].settlement, d("500"));
        assert_eq!(eth[1].cumulative_quantity, d("2"));
        assert_eq!(eth[1].cumulative_settlement, d("2500"));
        assert_eq!(eth[1].average_cost(), d("1250"));
    }

    #[test]
    fn test_flat_position_average_is_zero() {
        let trades = vec![
            trade(1_000, "ETHUSDT", Side::Buy, "1", "2000", "1"),
            trade(2_000, "ETHUSDT", Side::Sell, "1", "2000", "1"),
        ];
        let flows = aggregate_flows(&trades);
        let last = flows[&Asset::new("ETH")].last().unwrap().clone();
        assert!(last.cumulative_quantity.is_zero());
        assert!(last.average_cost().is_zero());
    }
}
