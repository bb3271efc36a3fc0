use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// OHLCV candlestick for the traded pair
///
/// Candle slices are ordered oldest-first everywhere in this crate.
/// The exchange returns newest-first; the gateway reverses on ingest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candle {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Order side for market order submission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderSide::Buy => "buy",
            OrderSide::Sell => "sell",
        }
    }
}

/// Candle bar granularity, in the exchange's notation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BarInterval {
    Min1,
    Min5,
    Min15,
    Hour1,
}

impl BarInterval {
    pub fn as_str(&self) -> &'static str {
        match self {
            BarInterval::Min1 => "1m",
            BarInterval::Min5 => "5m",
            BarInterval::Min15 => "15m",
            BarInterval::Hour1 => "1H",
        }
    }
}
