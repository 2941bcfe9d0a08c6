use super::ReconstructError;
use crate::domain::{Candle, Decimal, TimeMs};

/// Candles fetched around each cross-pair trade.
pub const QUOTE_WINDOW_CANDLES: usize = 2;

/// Open time of the first candle in the window bracketing `t`.
///
/// The window covers the previous minute and the minute containing `t`, so their
/// closes (at `floor_minute(t) - 1ms` and `floor_minute(t) + 59_999ms`) bracket it.
pub fn quote_window_start(t: TimeMs) -> TimeMs {
    t.floor_minute().minus_ms(60_000)
}

/// Linearly interpolate the close price at `t` between the first two candles.
///
/// Each close is stamped at its candle's `close_time`. Weights are clamped to
/// `[0, 1]` so a trade just outside the bracket takes the nearest close.
pub fn interpolate_quote_rate(
    market: &str,
    t: TimeMs,
    candles: &[Candle],
) -> Result<Decimal, ReconstructError> {
    let missing = || ReconstructError::MissingQuotes {
        market: market.to_string(),
        timestamp: t,
        found: candles.len(),
    };

    let [first, second, ..] = candles else {
        return Err(missing());
    };

    let t0 = first.close_time.as_ms();
    let t1 = second.close_time.as_ms();
    let span = t1 - t0;
    if span <= 0 {
        return Err(missing());
    }

    let w1 = Decimal::from_ms_ratio(t.as_ms() - t0, span).clamp(Decimal::zero(), Decimal::one());
    let w0 = Decimal::one() - w1;
    Ok(first.close * w0 + second.close * w1)
}
