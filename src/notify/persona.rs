use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

/// Structured event emitted by the decision loop
///
/// Trading logic only produces these; all phrasing lives below. That keeps
/// message text out of control flow and makes the loop deterministic.
#[derive(Debug, Clone, PartialEq)]
pub enum BotEvent {
    Greeting,
    BuyExecuted {
        price: f64,
        notional: f64,
        quantity: f64,
    },
    SellProfit {
        pnl: f64,
        pnl_fraction: f64,
    },
    SellStopLoss {
        pnl: f64,
        pnl_fraction: f64,
    },
    CooldownActive {
        remaining_secs: i64,
    },
    InsufficientFunds {
        notional: f64,
        minimum: f64,
    },
    DustPosition {
        notional: f64,
        minimum: f64,
    },
    MarketDataError,
    BalanceError,
    OrderError,
}

const GREETINGS: &[&str] = &[
    "Good day, sir. JARVIS is online and monitoring the market.",
    "Systems operational. Scanning market conditions now.",
    "JARVIS at your service. Market analysis engaged.",
    "Booting up trading protocols. Let's make some profits, sir.",
];

const BUY_LINES: &[&str] = &[
    "Sir, I have identified an opportunity and entered a position.",
    "Executing entry protocols. Position acquired.",
    "The conditions aligned, sir. We are now long.",
];

const SELL_PROFIT_LINES: &[&str] = &[
    "Profit secured, sir. A most satisfactory trade.",
    "Target reached. Closing the position with gains.",
    "Another successful operation, sir. Profits banked.",
];

const SELL_STOP_LINES: &[&str] = &[
    "Sir, the stop-loss protocol has been engaged. Position closed.",
    "Cutting losses as planned, sir. Capital preservation first.",
    "The market turned against us. Exiting to limit damage.",
];

const COOLDOWN_LINES: &[&str] = &[
    "Entry signal detected, sir, but trade cooldown is still in effect.",
    "Holding fire: the cooldown window has not yet elapsed.",
    "Patience protocols engaged, sir. Too soon since the last trade.",
];

const INSUFFICIENT_FUNDS_LINES: &[&str] = &[
    "Sir, available funds fall short of the minimum order size.",
    "Entry aborted: the balance does not support a viable order.",
    "I must decline this trade, sir. The account is too thin.",
];

const DUST_POSITION_LINES: &[&str] = &[
    "Sir, the position has shrunk below the minimum sellable size.",
    "Exit aborted: the position is too small for the venue to accept.",
];

const MARKET_DATA_ERROR_LINES: &[&str] = &[
    "Sir, an unexpected anomaly has occurred while fetching market data.",
    "Market telemetry is unresponsive, sir. Retrying shortly.",
    "I have lost contact with the exchange data feed. Standing by.",
];

const BALANCE_ERROR_LINES: &[&str] = &[
    "Sir, I regret to inform you that balance retrieval has failed.",
    "The account ledger is unreachable, sir. I will try again.",
];

const ORDER_ERROR_LINES: &[&str] = &[
    "Sir, the venue rejected our order. No position change.",
    "Order submission failed, sir. The state remains as it was.",
];

const STATUS_POSITIVE: &[&str] = &[
    "Sir, the portfolio is in excellent shape. Profits are accumulating.",
    "All systems are green, sir. The market is working in our favor.",
    "Your trading strategy is performing admirably. Gains are being secured.",
    "Impressive results, sir. Our profit trajectory remains strong.",
];

const STATUS_NEUTRAL: &[&str] = &[
    "Market conditions are stable. No significant shifts detected.",
    "Nothing extraordinary to report, sir. We are maintaining course.",
    "Your portfolio is in a balanced state. No immediate concerns.",
    "Data suggests a steady market. Monitoring for new opportunities.",
];

const STATUS_NEGATIVE: &[&str] = &[
    "Sir, losses have been detected. Adjustments may be required.",
    "Market conditions have not been favorable. A recalibration might be necessary.",
    "Red flags detected in our strategy. We might need to rethink our approach.",
    "Performance is suboptimal, sir. I suggest a reassessment of our parameters.",
];

// Mood thresholds for the status report, in quote currency
const MOOD_POSITIVE_ABOVE: f64 = 50.0;
const MOOD_NEGATIVE_BELOW: f64 = -50.0;

/// Maps events to persona text
///
/// Holds its own RNG so tests can seed it and get stable output.
pub struct MessageComposer {
    rng: StdRng,
}

impl MessageComposer {
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    fn pick(&mut self, pool: &[&'static str]) -> &'static str {
        pool.choose(&mut self.rng).copied().unwrap_or("")
    }

    /// Render an event as a channel message
    pub fn compose(&mut self, event: &BotEvent) -> String {
        match event {
            BotEvent::Greeting => self.pick(GREETINGS).to_string(),
            BotEvent::BuyExecuted {
                price,
                notional,
                quantity,
            } => format!(
                "{}\n🟢 Bought {:.4} units @ ${:.4} (${:.2})",
                self.pick(BUY_LINES),
                quantity,
                price,
                notional
            ),
            BotEvent::SellProfit { pnl, pnl_fraction } => format!(
                "{}\n💰 Profit: ${:.2} ({:+.2}%)",
                self.pick(SELL_PROFIT_LINES),
                pnl,
                pnl_fraction * 100.0
            ),
            BotEvent::SellStopLoss { pnl, pnl_fraction } => format!(
                "{}\n🔻 Loss: ${:.2} ({:+.2}%)",
                self.pick(SELL_STOP_LINES),
                pnl,
                pnl_fraction * 100.0
            ),
            BotEvent::CooldownActive { remaining_secs } => format!(
                "{}\n⏳ {}m {}s remaining",
                self.pick(COOLDOWN_LINES),
                remaining_secs / 60,
                remaining_secs % 60
            ),
            BotEvent::InsufficientFunds { notional, minimum } => format!(
                "{}\n(order ${:.2}, minimum ${:.2})",
                self.pick(INSUFFICIENT_FUNDS_LINES),
                notional,
                minimum
            ),
            BotEvent::DustPosition { notional, minimum } => format!(
                "{}\n(position ${:.2}, minimum ${:.2})",
                self.pick(DUST_POSITION_LINES),
                notional,
                minimum
            ),
            BotEvent::MarketDataError => self.pick(MARKET_DATA_ERROR_LINES).to_string(),
            BotEvent::BalanceError => self.pick(BALANCE_ERROR_LINES).to_string(),
            BotEvent::OrderError => self.pick(ORDER_ERROR_LINES).to_string(),
        }
    }

    /// Mood line for the status report, keyed on cumulative profit/loss
    pub fn status_mood(&mut self, total_profit_loss: f64) -> &'static str {
        if total_profit_loss > MOOD_POSITIVE_ABOVE {
            self.pick(STATUS_POSITIVE)
        } else if total_profit_loss < MOOD_NEGATIVE_BELOW {
            self.pick(STATUS_NEGATIVE)
        } else {
            self.pick(STATUS_NEUTRAL)
        }
    }
}

impl Default for MessageComposer {
    fn default() -> Self {
        Self::new()
    }
}
