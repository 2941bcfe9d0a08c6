//! Market symbol decomposition into (base, quote).

use super::{Asset, ValidationError};
use serde::{Deserialize, Serialize};

/// A trading pair such as `ETHBTC`, decomposed into its base and quote assets.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Market {
    pub symbol: String,
    pub base: Asset,
    pub quote: Asset,
}

/// Decomposes market symbols against an explicit list of known quote assets.
///
/// Matching picks the longest known quote suffix that leaves a non-empty base, so
/// `BTCUSDT` resolves to `(BTC, USDT)` even when `BTC` is also a quote asset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarketResolver {
    settlement: Asset,
    quote_assets: Vec<Asset>,
}

impl MarketResolver {
    /// Build a resolver. The settlement asset is always accepted as a quote.
    pub fn new(settlement: Asset, quote_assets: Vec<Asset>) -> Self {
        let mut quote_assets = quote_assets;
        if !quote_assets.contains(&settlement) {
            quote_assets.push(settlement.clone());
        }
        quote_assets.sort_by(|a, b| {
            b.as_str()
                .len()
                .cmp(&a.as_str().len())
                .then_with(|| a.cmp(b))
        });
        quote_assets.dedup();
        Self {
            settlement,
            quote_assets,
        }
    }

    pub fn settlement(&self) -> &Asset {
        &self.settlement
    }

    pub fn quote_assets(&self) -> &[Asset] {
        &self.quote_assets
    }

    pub fn resolve(&self, symbol: &str) -> Result<Market, ValidationError> {
        let symbol = symbol.trim().to_ascii_uppercase();
        let quote = self
            .quote_assets
            .iter()
            .find(|q| symbol.len() > q.as_str().len() && symbol.ends_with(q.as_str()))
            .ok_or_else(|| {
                if self
                    .quote_assets
                    .iter()
                    .any(|q| symbol == q.as_str())
                {
                    ValidationError::EmptyBase {
                        market: symbol.clone(),
                    }
                } else {
                    ValidationError::UnknownQuoteAsset {
                        market: symbol.clone(),
                    }
                }
            })?;

        let base = &symbol[..symbol.len() - quote.as_str().len()];
        Ok(Market {
            base: Asset::new(base),
            quote: quote.clone(),
            symbol,
        })
    }

    /// Whether the market is priced directly in the settlement asset.
    pub fn is_settlement_quoted(&self, market: &Market) -> bool {
        market.quote == self.settlement
    }

    /// Symbol pricing one unit of `asset` in the settlement currency, e.g. `BTCUSDT`.
    pub fn settlement_symbol(&self, asset: &Asset) -> String {
        format!("{}{}", asset.as_str(), self.settlement.as_str())
    }
}

impl Default for MarketResolver {
    fn default() -> Self {
        Self::new(
            Asset::new("USDT"),
            ["USDT", "USDC", "FDUSD", "BTC", "ETH", "BNB"]
                .iter()
                .map(|s| Asset::new(*s))
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_settlement_quoted() {
        let m = MarketResolver::default().resolve("ETHUSDT").unwrap();
        assert_eq!(m.base, Asset::new("ETH"));
        assert_eq!(m.quote, Asset::new("USDT"));
    }

    #[test]
    fn test_resolve_cross_pair() {
        let resolver = MarketResolver::default();
        let m = resolver.resolve("ethbtc").unwrap();
        assert_eq!(m.symbol, "ETHBTC");
        assert_eq!(m.base, Asset::new("ETH"));
        assert_eq!(m.quote, Asset::new("BTC"));
        assert!(!resolver.is_settlement_quoted(&m));
        assert_eq!(resolver.settlement_symbol(&m.quote), "BTCUSDT");
    }

    #[test]
    fn test_longest_suffix_wins() {
        let m = MarketResolver::default().resolve("SOLFDUSD").unwrap();
        assert_eq!(m.base, Asset::new("SOL"));
        assert_eq!(m.quote, Asset::new("FDUSD"));
    }

    #[test]
    fn test_unknown_suffix_rejected() {
        let err = MarketResolver::default().resolve("ETHEUR").unwrap_err();
        assert_eq!(
            err,
            ValidationError::UnknownQuoteAsset {
                market: "ETHEUR".to_string()
            }
        );
    }

    #[test]
    fn test_bare_quote_rejected() {
        let err = MarketResolver::default().resolve("USDT").unwrap_err();
        assert!(matches!(err, ValidationError::EmptyBase { .. }));
    }

    #[test]
    fn test_settlement_always_a_quote() {
        let resolver = MarketResolver::new(Asset::new("USDC"), vec![Asset::new("BTC")]);
        let m = resolver.resolve("ETHUSDC").unwrap();
        assert!(resolver.is_settlement_quoted(&m));
    }
}
