use super::flows::aggregate_flows;
use crate::domain::{ordering::sort_trades_deterministic, Asset, Decimal, TimeMs, Trade};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;

/// How the reported basis series is derived from the running average.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BasisSmoothing {
    /// Pool each point's cumulative value and quantity with the next point's and
    /// report their ratio; the last point is left as is.
    #[default]
    Forward,
    /// Report the running average unchanged.
    Off,
}

impl FromStr for BasisSmoothing {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "forward" => Ok(BasisSmoothing::Forward),
            "off" | "none" => Ok(BasisSmoothing::Off),
            other => Err(format!("invalid basis smoothing: {}", other)),
        }
    }
}

/// Cost basis of one asset at one timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookCostPoint {
    pub timestamp: TimeMs,
    /// Cumulative quantity held after this timestamp's flows.
    pub quantity: Decimal,
    /// Cumulative settlement value after this timestamp's flows.
    pub settlement_value: Decimal,
    /// Running average just before this timestamp.
    pub average_before: Decimal,
    /// Running average just after this timestamp.
    pub average_after: Decimal,
    /// Basis as published, after smoothing.
    pub reported: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookCost {
    pub smoothing: BasisSmoothing,
    pub assets: BTreeMap<Asset, Vec<BookCostPoint>>,
}

impl BookCost {
    pub fn series(&self, asset: &Asset) -> Option<&[BookCostPoint]> {
        self.assets.get(asset).map(Vec::as_slice)
    }

    pub fn latest(&self, asset: &Asset) -> Option<&BookCostPoint> {
        self.assets.get(asset).and_then(|s| s.last())
    }

    /// The point recorded exactly at `timestamp`, if the asset moved then.
    pub fn at(&self, asset: &Asset, timestamp: TimeMs) -> Option<&BookCostPoint> {
        let series = self.assets.get(asset)?;
        series
            .binary_search_by_key(&timestamp, |p| p.timestamp)
            .ok()
            .map(|idx| &series[idx])
    }
}

/// Running weighted-average cost per asset over the whole trade list.
pub fn compute_book_cost(trades: &[Trade], smoothing: BasisSmoothing) -> BookCost {
    let mut ordered = trades.to_vec();
    sort_trades_deterministic(&mut ordered);

    let assets = aggregate_flows(&ordered)
        .into_iter()
        .map(|(asset, flows)| {
            let mut average_before = Decimal::zero();
            let mut points: Vec<BookCostPoint> = flows
                .iter()
                .map(|flow| {
                    let average_after = flow.average_cost();
                    let point = BookCostPoint {
                        timestamp: flow.timestamp,
                        quantity: flow.cumulative_quantity,
                        settlement_value: flow.cumulative_settlement,
                        average_before,
                        average_after,
                        reported: average_after,
                    };
                    average_before = average_after;
                    point
                })
                .collect();
            apply_smoothing(&mut points, smoothing);
            (asset, points)
        })
        .collect();

    BookCost { smoothing, assets }
}

fn apply_smoothing(points: &mut [BookCostPoint], smoothing: BasisSmoothing) {
    if smoothing == BasisSmoothing::Off {
        return;
    }
    for i in 0..points.len().saturating_sub(1) {
        let (current, next) = (&points[i], &points[i + 1]);
        let value = current.settlement_value + next.settlement_value;
        let quantity = current.quantity + next.quantity;
        points[i].reported = value.safe_div(quantity);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{MarketResolver, RawTradeRow, Side};

    fn d(s: &str) -> Decimal {
        Decimal::from_str_canonical(s).unwrap()
    }

    fn buy(ts: i64, amount: &str, price: &str) -> Trade {
        let row = RawTradeRow::new(TimeMs::new(ts), "ETHUSDT", Side::Buy, d(amount), d(price));
        let market = MarketResolver::default().resolve("ETHUSDT").unwrap();
        Trade::settle(&row, market, Decimal::one()).unwrap()
    }

    #[test]
    fn test_running_average_over_buys() {
        let trades = vec![buy(1, "1", "2000"), buy(2, "3", "3000")];
        let book = compute_book_cost(&trades, BasisSmoothing::Off);
        let eth = book.series(&Asset::new("ETH")).unwrap();

        assert_eq!(eth[0].average_before, Decimal::zero());
        assert_eq!(eth[0].average_after, d("2000"));
        assert_eq!(eth[1].average_before, d("2000"));
        assert_eq!(eth[1].average_after, d("2750"));
        assert_eq!(eth[1].quantity, d("4"));
        assert_eq!(eth[1].reported, eth[1].average_after);
    }

    #[test]
    fn test_forward_smoothing() {
        let trades = vec![buy(1, "1", "2000"), buy(2, "3", "3000")];
        let book = compute_book_cost(&trades, BasisSmoothing::Forward);
        let eth = book.series(&Asset::new("ETH")).unwrap();

        // (2000 + 11000) / (1 + 4), not the mean of 2000 and 2750
        assert_eq!(eth[0].reported, d("2600"));
        assert_eq!(eth[1].reported, d("2750"));
        assert_eq!(eth[0].average_after, d("2000"));
    }

    #[test]
    fn test_forward_smoothing_through_flat_position() {
        let sell = {
            let row = RawTradeRow::new(TimeMs::new(2), "ETHUSDT", Side::Sell, d("1"), d("2500"));
            let market = MarketResolver::default().resolve("ETHUSDT").unwrap();
            Trade::settle(&row, market, Decimal::one()).unwrap()
        };
        let trades = vec![buy(1, "1", "2000"), sell, buy(3, "1", "3000")];
        let book = compute_book_cost(&trades, BasisSmoothing::Forward);
        let eth = book.series(&Asset::new("ETH")).unwrap();

        // values 2000, -500, 2500 over quantities 1, 0, 1
        assert_eq!(eth[0].reported, d("1500"));
        assert_eq!(eth[1].reported, d("2000"));
        assert_eq!(eth[2].reported, d("2500"));
    }

    #[test]
    fn test_input_order_does_not_matter() {
        let a = compute_book_cost(&[buy(1, "1", "2000"), buy(2, "3", "3000")], BasisSmoothing::Forward);
        let b = compute_book_cost(&[buy(2, "3", "3000"), buy(1, "1", "2000")], BasisSmoothing::Forward);
        assert_eq!(a, b);
    }

    #[test]
    fn test_lookup_at_timestamp() {
        let book = compute_book_cost(&[buy(1, "1", "2000"), buy(5, "1", "4000")], BasisSmoothing::Off);
        let eth = Asset::new("ETH");
        assert_eq!(book.at(&eth, TimeMs::new(5)).unwrap().average_after, d("3000"));
        assert!(book.at(&eth, TimeMs::new(3)).is_none());
        assert_eq!(book.latest(&eth).unwrap().timestamp, TimeMs::new(5));
    }

    #[test]
    fn test_smoothing_parse() {
        assert_eq!("Forward".parse::<BasisSmoothing>().unwrap(), BasisSmoothing::Forward);
        assert_eq!("off".parse::<BasisSmoothing>().unwrap(), BasisSmoothing::Off);
        assert!("sideways".parse::<BasisSmoothing>().is_err());
    }
}
