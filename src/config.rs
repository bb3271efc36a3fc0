use crate::error::BotError;

// OKX API domains
pub const OKX_DOMAIN_MY: &str = "https://my.okx.com";
pub const OKX_DOMAIN_WWW: &str = "https://www.okx.com";

// Trading parameter defaults
const DEFAULT_SYMBOL: &str = "PI-USD";
const DEFAULT_ORDER_FRACTION: f64 = 0.85;
const DEFAULT_PROFIT_THRESHOLD: f64 = 0.03;
const DEFAULT_STOP_LOSS: f64 = 0.035;
const DEFAULT_COOLDOWN_SECS: u64 = 3600;
const DEFAULT_POLL_INTERVAL_SECS: u64 = 60;
const DEFAULT_RETRY_DELAY_SECS: u64 = 30;
const DEFAULT_MIN_ORDER_NOTIONAL: f64 = 10.0;

/// Immutable trading parameters, loaded once at startup
#[derive(Debug, Clone)]
pub struct TradingConfig {
    pub symbol: String,
    /// Fraction of the available quote balance committed per entry (0, 1]
    pub order_fraction: f64,
    /// Take-profit threshold as a fraction of entry price
    pub profit_threshold: f64,
    /// Static stop-loss fraction, also the floor for the ATR stop
    pub stop_loss: f64,
    pub cooldown_secs: u64,
    pub poll_interval_secs: u64,
    pub retry_delay_secs: u64,
    /// Smallest order the venue will accept, in quote currency
    pub min_order_notional: f64,
}

impl Default for TradingConfig {
    fn default() -> Self {
        Self {
            symbol: DEFAULT_SYMBOL.to_string(),
            order_fraction: DEFAULT_ORDER_FRACTION,
            profit_threshold: DEFAULT_PROFIT_THRESHOLD,
            stop_loss: DEFAULT_STOP_LOSS,
            cooldown_secs: DEFAULT_COOLDOWN_SECS,
            poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
            retry_delay_secs: DEFAULT_RETRY_DELAY_SECS,
            min_order_notional: DEFAULT_MIN_ORDER_NOTIONAL,
        }
    }
}

impl TradingConfig {
    /// Load trading parameters from the environment, falling back to the
    /// defaults above for anything unset
    pub fn from_env() -> Result<Self, BotError> {
        let config = Self {
            symbol: env_or("SYMBOL", DEFAULT_SYMBOL.to_string()),
            order_fraction: env_parsed("ORDER_FRACTION", DEFAULT_ORDER_FRACTION),
            profit_threshold: env_parsed("PROFIT_THRESHOLD", DEFAULT_PROFIT_THRESHOLD),
            stop_loss: env_parsed("STOP_LOSS", DEFAULT_STOP_LOSS),
            cooldown_secs: env_parsed("TRADE_COOLDOWN_SECS", DEFAULT_COOLDOWN_SECS),
            poll_interval_secs: env_parsed("POLL_INTERVAL_SECS", DEFAULT_POLL_INTERVAL_SECS),
            retry_delay_secs: env_parsed("RETRY_DELAY_SECS", DEFAULT_RETRY_DELAY_SECS),
            min_order_notional: env_parsed("MIN_ORDER_NOTIONAL", DEFAULT_MIN_ORDER_NOTIONAL),
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), BotError> {
        if !(self.order_fraction > 0.0 && self.order_fraction <= 1.0) {
            return Err(BotError::Config(format!(
                "ORDER_FRACTION must be in (0, 1], got {}",
                self.order_fraction
            )));
        }
        if self.profit_threshold <= 0.0 {
            return Err(BotError::Config(format!(
                "PROFIT_THRESHOLD must be positive, got {}",
                self.profit_threshold
            )));
        }
        if self.stop_loss <= 0.0 {
            return Err(BotError::Config(format!(
                "STOP_LOSS must be positive, got {}",
                self.stop_loss
            )));
        }
        if self.symbol.is_empty() {
            return Err(BotError::Config("SYMBOL must not be empty".to_string()));
        }
        Ok(())
    }
}

/// OKX API credentials and base domain
#[derive(Debug, Clone)]
pub struct OkxCredentials {
    pub api_key: String,
    pub secret: String,
    pub passphrase: String,
    pub base_url: String,
}

impl OkxCredentials {
    pub fn from_env() -> Result<Self, BotError> {
        Ok(Self {
            api_key: required_env("OKX_API_KEY")?,
            secret: required_env("OKX_SECRET")?,
            passphrase: required_env("OKX_PASSWORD")?,
            base_url: env_or("OKX_BASE_URL", OKX_DOMAIN_MY.to_string()),
        })
    }
}

/// Telegram bot token and target chat
#[derive(Debug, Clone)]
pub struct TelegramConfig {
    pub token: String,
    pub chat_id: String,
}

impl TelegramConfig {
    pub fn from_env() -> Result<Self, BotError> {
        Ok(Self {
            token: required_env("TELEGRAM_TOKEN")?,
            chat_id: required_env("TELEGRAM_CHAT_ID")?,
        })
    }
}

fn env_or(key: &str, default: String) -> String {
    std::env::var(key).unwrap_or(default)
}

fn env_parsed<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

fn required_env(key: &str) -> Result<String, BotError> {
    std::env::var(key).map_err(|_| BotError::Config(format!("{} not set in environment", key)))
}
