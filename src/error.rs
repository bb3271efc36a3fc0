use thiserror::Error;

/// Error taxonomy for the trading bot
///
/// Gateway and indicator failures are caught at the decision-loop boundary
/// and converted into a notification plus a retry sleep; they never
/// terminate the process. `AlreadyOpen`/`NotOpen` indicate an internal
/// logic bug and are cycle-fatal only.
#[derive(Debug, Error)]
pub enum BotError {
    #[error("market data unavailable: {0}")]
    MarketDataUnavailable(String),

    #[error("balance unavailable: {0}")]
    BalanceUnavailable(String),

    #[error("order failed: {0}")]
    OrderFailed(String),

    #[error("insufficient data: have {got} candles, need {needed}")]
    InsufficientData { needed: usize, got: usize },

    #[error("order notional ${notional:.2} below minimum ${minimum:.2}")]
    InsufficientFunds { notional: f64, minimum: f64 },

    #[error("notification delivery failed: {0}")]
    DeliveryFailed(String),

    #[error("position already open")]
    AlreadyOpen,

    #[error("no open position")]
    NotOpen,

    #[error("invalid configuration: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, BotError>;
