// Execution gateway
//
// The decision loop talks to the trading venue through the `Venue` trait;
// `OkxClient` is the production implementation. Rate limiting, retries,
// and timeouts all live behind this seam.
pub mod okx;

use async_trait::async_trait;

use crate::error::BotError;
use crate::models::{BarInterval, Candle};

pub use okx::OkxClient;

/// Narrow interface to the trading venue
///
/// All calls are synchronous from the decision loop's point of view: they
/// suspend the calling task until the venue answers or the gateway gives
/// up. Failures map onto the market-data/balance/order error variants.
#[async_trait]
pub trait Venue: Send + Sync {
    /// Last traded price for the instrument
    async fn fetch_price(&self, symbol: &str) -> Result<f64, BotError>;

    /// Available (free) balance for a currency
    async fn fetch_balance(&self, currency: &str) -> Result<f64, BotError>;

    /// Recent candles, oldest first
    async fn fetch_candles(
        &self,
        symbol: &str,
        interval: BarInterval,
        limit: usize,
    ) -> Result<Vec<Candle>, BotError>;

    /// Market buy sized in quote currency; returns the venue order id
    async fn place_market_buy(&self, symbol: &str, notional: f64) -> Result<String, BotError>;

    /// Market sell sized in base currency; returns the venue order id
    async fn place_market_sell(&self, symbol: &str, quantity: f64) -> Result<String, BotError>;
}
