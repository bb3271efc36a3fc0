use crate::error::BotError;
use crate::models::Candle;

/// Calculate Relative Strength Index (RSI)
///
/// RSI measures the magnitude of recent price changes to evaluate
/// overbought or oversold conditions.
///
/// Values:
/// - RSI > 70: Overbought
/// - RSI < 30: Oversold
///
/// Uses the simple (non-exponential) average of gains and losses over the
/// last `period` close-to-close deltas. When the window has no losses the
/// result is exactly 100.0, never a division by zero.
pub fn calculate_rsi(candles: &[Candle], period: usize) -> Result<f64, BotError> {
    if candles.len() < period + 1 {
        return Err(BotError::InsufficientData {
            needed: period + 1,
            got: candles.len(),
        });
    }

    let mut gains = 0.0;
    let mut losses = 0.0;

    // Last `period` deltas between consecutive closes
    let window = &candles[candles.len() - (period + 1)..];
    for pair in window.windows(2) {
        let change = pair[1].close - pair[0].close;
        if change > 0.0 {
            gains += change;
        } else {
            losses += change.abs();
        }
    }

    let avg_gain = gains / period as f64;
    let avg_loss = losses / period as f64;

    if avg_loss == 0.0 {
        return Ok(100.0);
    }

    let rs = avg_gain / avg_loss;
    Ok(100.0 - (100.0 / (1.0 + rs)))
}
