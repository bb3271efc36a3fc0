use crate::error::BotError;
use crate::models::Candle;

/// Average True Range (ATR)
///
/// Measures market volatility as the mean of true ranges over the window.
/// True Range is the greatest of:
/// - Current High - Current Low
/// - Abs(Current High - Previous Close)
/// - Abs(Current Low - Previous Close)
///
/// Returns the average of the last `period` true ranges. Callers that use
/// ATR for stop sizing decide their own fallback when this fails.
pub fn calculate_atr(candles: &[Candle], period: usize) -> Result<f64, BotError> {
    if candles.len() < period + 1 {
        return Err(BotError::InsufficientData {
            needed: period + 1,
            got: candles.len(),
        });
    }

    let window = &candles[candles.len() - (period + 1)..];
    let mut sum = 0.0;
    for pair in window.windows(2) {
        let high = pair[1].high;
        let low = pair[1].low;
        let prev_close = pair[0].close;

        let tr = (high - low)
            .max((high - prev_close).abs())
            .max((low - prev_close).abs());
        sum += tr;
    }

    Ok(sum / period as f64)
}
