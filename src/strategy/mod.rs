// Entry/exit gating
//
// Pure predicates over indicator outputs. The decision loop owns all I/O
// and state; everything here is testable with bare candle slices.

use crate::error::BotError;
use crate::indicators::{calculate_atr, calculate_rsi, is_trending_up};
use crate::models::Candle;

/// Indicator periods and thresholds for signal generation
#[derive(Debug, Clone)]
pub struct SignalConfig {
    pub rsi_period: usize,
    pub rsi_oversold: f64,
    pub short_ma_period: usize,
    pub long_ma_period: usize,
    pub atr_period: usize,
    /// ATR-to-stop mapping: stop fraction = atr * multiplier / entry price
    pub atr_stop_multiplier: f64,
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            rsi_period: 14,
            rsi_oversold: 30.0,
            short_ma_period: 10,
            long_ma_period: 50,
            atr_period: 14,
            atr_stop_multiplier: 2.0,
        }
    }
}

impl SignalConfig {
    /// Candles required before any entry evaluation can run
    pub fn min_candles(&self) -> usize {
        self.long_ma_period
            .max(self.rsi_period + 1)
            .max(self.atr_period + 1)
    }
}

/// Indicator readings backing one entry decision
#[derive(Debug, Clone)]
pub struct EntryEvaluation {
    pub rsi: f64,
    pub trending_up: bool,
}

impl EntryEvaluation {
    /// Entry gate: oversold AND uptrend, both required
    pub fn signals_entry(&self, config: &SignalConfig) -> bool {
        self.rsi < config.rsi_oversold && self.trending_up
    }
}

/// Evaluate the entry gate over the candle window
pub fn evaluate_entry(
    candles: &[Candle],
    config: &SignalConfig,
) -> Result<EntryEvaluation, BotError> {
    let rsi = calculate_rsi(candles, config.rsi_period)?;
    let trending_up = is_trending_up(candles, config.short_ma_period, config.long_ma_period)?;
    Ok(EntryEvaluation { rsi, trending_up })
}

/// Why an open position is being exited
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    TakeProfit,
    StopLoss,
}

/// Stop distance as a fraction of entry price
///
/// ATR-derived when the window supports it, floored at the static stop so
/// volatility widens the stop but never narrows it. Falls back to the
/// static stop entirely when ATR cannot be computed.
pub fn stop_fraction(
    candles: &[Candle],
    entry_price: f64,
    static_stop: f64,
    config: &SignalConfig,
) -> f64 {
    match calculate_atr(candles, config.atr_period) {
        Ok(atr) => (atr * config.atr_stop_multiplier / entry_price).max(static_stop),
        Err(_) => static_stop,
    }
}

/// Exit gate for an open position
pub fn evaluate_exit(
    pnl_fraction: f64,
    profit_threshold: f64,
    stop: f64,
) -> Option<ExitReason> {
    if pnl_fraction >= profit_threshold {
        Some(ExitReason::TakeProfit)
    } else if pnl_fraction <= -stop {
        Some(ExitReason::StopLoss)
    } else {
        None
    }
}
