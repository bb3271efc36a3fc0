use crate::error::BotError;
use crate::indicators::calculate_sma;
use crate::models::Candle;

/// Dual-SMA trend test
///
/// Returns true iff the short moving average of closes sits above the long
/// one. Requires at least `long_period` candles.
pub fn is_trending_up(
    candles: &[Candle],
    short_period: usize,
    long_period: usize,
) -> Result<bool, BotError> {
    if candles.len() < long_period {
        return Err(BotError::InsufficientData {
            needed: long_period,
            got: candles.len(),
        });
    }

    let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
    let short_ma = calculate_sma(&closes, short_period).ok_or(BotError::InsufficientData {
        needed: short_period,
        got: closes.len(),
    })?;
    let long_ma = calculate_sma(&closes, long_period).ok_or(BotError::InsufficientData {
        needed: long_period,
        got: closes.len(),
    })?;

    Ok(short_ma > long_ma)
}
