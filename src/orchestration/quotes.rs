//! Market data lookups routed through the orchestration client.

use super::client::{FetchError, OrchestrationClient};
use crate::datasource::{DataSourceError, KlineRequest, QuoteSource, MAX_KLINE_LIMIT};
use crate::domain::{Asset, Candle, Decimal, MarketResolver, TimeMs};
use futures::future::join_all;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Request weight of one kline call.
pub const KLINE_WEIGHT: u32 = 2;

const LATEST_PRICE_TTL: Duration = Duration::from_secs(10);
const DAY_MS: i64 = 86_400_000;

/// Daily closes keyed by `YYYY-MM-DD` then asset.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceTable {
    pub symbols: Vec<String>,
    pub data: BTreeMap<String, BTreeMap<String, Decimal>>,
    pub count: usize,
}

#[derive(Debug)]
pub struct QuoteService {
    client: Arc<OrchestrationClient>,
    source: Arc<dyn QuoteSource>,
    resolver: MarketResolver,
    prices_ttl: Duration,
}

impl QuoteService {
    pub fn new(
        client: Arc<OrchestrationClient>,
        source: Arc<dyn QuoteSource>,
        resolver: MarketResolver,
        prices_ttl: Duration,
    ) -> Self {
        Self {
            client,
            source,
            resolver,
            prices_ttl,
        }
    }

    pub fn resolver(&self) -> &MarketResolver {
        &self.resolver
    }

    pub fn client(&self) -> &Arc<OrchestrationClient> {
        &self.client
    }

    /// `count` one-minute candles on `market` opening at or after `start`.
    pub async fn get_quote(
        &self,
        market: &str,
        start: TimeMs,
        count: usize,
    ) -> Result<Vec<Candle>, FetchError> {
        let key = format!("klines:{}:1m:{}:{}", market, start, count);
        let source = Arc::clone(&self.source);
        let market = market.to_string();
        let candles: Vec<Candle> = self
            .client
            .fetch_with_cache(
                &key,
                move || source.get_quote(&market, start, count),
                KLINE_WEIGHT,
                Some(self.prices_ttl),
                true,
            )
            .await?;

        // A window the exchange has not finished yet must be refetched later.
        if candles.len() < count {
            if let Err(e) = self.client.cache().delete(&key).await {
                warn!("Failed to evict incomplete window {}: {}", key, e);
            }
        }
        Ok(candles)
    }

    /// Close of the most recent one-minute candle, if the exchange returned any.
    pub async fn latest_price(&self, market: &str) -> Result<Option<Decimal>, FetchError> {
        let start = TimeMs::now().floor_minute().minus_ms(60_000);
        let key = format!("latest:{}", market);
        let source = Arc::clone(&self.source);
        let owned = market.to_string();
        let candles: Vec<Candle> = self
            .client
            .fetch_with_cache(
                &key,
                move || source.get_quote(&owned, start, 2),
                KLINE_WEIGHT,
                Some(LATEST_PRICE_TTL),
                true,
            )
            .await?;
        Ok(candles.last().map(|c| c.close))
    }

    /// Daily closes for each asset, priced against the settlement asset.
    ///
    /// Symbols are fetched concurrently; one that fails is logged and left out of
    /// the table. The settlement asset itself is always worth 1.
    pub async fn get_daily_closes(
        &self,
        symbols: &[String],
        from: TimeMs,
        to: TimeMs,
        use_cache: bool,
    ) -> Result<PriceTable, FetchError> {
        let settlement = self.resolver.settlement().as_str().to_string();
        let assets: Vec<String> = symbols
            .iter()
            .map(|s| s.trim().to_ascii_uppercase())
            .filter(|s| !s.is_empty())
            .collect();

        let fetches = assets
            .iter()
            .filter(|asset| **asset != settlement)
            .map(|asset| self.daily_series(asset, from, to, use_cache));
        let results = join_all(fetches).await;

        let mut symbols_out = Vec::new();
        let mut data: BTreeMap<String, BTreeMap<String, Decimal>> = BTreeMap::new();
        for (asset, result) in assets
            .iter()
            .filter(|asset| **asset != settlement)
            .zip(results)
        {
            match result {
                Ok(candles) => {
                    for candle in candles {
                        if let Some(date) = date_key(candle.open_time) {
                            data.entry(date)
                                .or_default()
                                .insert(asset.clone(), candle.close);
                        }
                    }
                    symbols_out.push(asset.clone());
                }
                Err(FetchError::RateLimitExceeded { key, source }) => {
                    return Err(FetchError::RateLimitExceeded { key, source });
                }
                Err(e) => warn!("Skipping {} in daily closes: {}", asset, e),
            }
        }

        if assets.contains(&settlement) {
            if data.is_empty() {
                let mut day = from.as_ms().div_euclid(DAY_MS) * DAY_MS;
                while day <= to.as_ms() {
                    if let Some(date) = date_key(TimeMs::new(day)) {
                        data.insert(date, BTreeMap::new());
                    }
                    day += DAY_MS;
                }
            }
            for row in data.values_mut() {
                row.insert(settlement.clone(), Decimal::one());
            }
            symbols_out.push(settlement);
        }

        info!(
            "Daily closes: {} of {} symbol(s) over {} day(s)",
            symbols_out.len(),
            assets.len(),
            data.len()
        );
        Ok(PriceTable {
            symbols: symbols_out,
            count: data.len(),
            data,
        })
    }

    /// Daily candles over `[from, to]`, paged so long ranges are not cut off at
    /// the exchange's per-call limit. Each page costs one unit of budget.
    async fn daily_series(
        &self,
        asset: &str,
        from: TimeMs,
        to: TimeMs,
        use_cache: bool,
    ) -> Result<Vec<Candle>, FetchError> {
        let market = self.resolver.settlement_symbol(&Asset::new(asset));
        let key = format!("klines:{}:1d:{}:{}", market, from, to);
        let source = Arc::clone(&self.source);
        self.client
            .fetch_with_cache(
                &key,
                move || {
                    let mut candles = Vec::new();
                    let mut start = from;
                    loop {
                        let page = source.klines(&KlineRequest::daily(&market, start, to))?;
                        let full = page.len() >= MAX_KLINE_LIMIT;
                        let Some(next) = page.last().map(|c| c.open_time.as_ms() + DAY_MS) else {
                            break;
                        };
                        candles.extend(page);
                        if !full || next > to.as_ms() {
                            break;
                        }
                        start = TimeMs::new(next);
                    }
                    Ok::<_, DataSourceError>(candles)
                },
                daily_pages(from, to),
                Some(self.prices_ttl),
                use_cache,
            )
            .await
    }
}

/// Kline calls needed to cover `[from, to]` with daily candles.
fn daily_pages(from: TimeMs, to: TimeMs) -> u32 {
    let first = from.as_ms().div_euclid(DAY_MS);
    let last = to.as_ms().div_euclid(DAY_MS);
    let days = usize::try_from(last - first + 1).unwrap_or(1).max(1);
    u32::try_from(days.div_ceil(MAX_KLINE_LIMIT)).unwrap_or(u32::MAX)
}

fn date_key(t: TimeMs) -> Option<String> {
    t.to_datetime().map(|dt| dt.format("%Y-%m-%d").to_string())
}
