use chrono::{DateTime, Duration, Utc};

use crate::error::BotError;

/// An open long position
#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    pub entry_price: f64,
    pub quantity: f64,
    pub opened_at: DateTime<Utc>,
}

impl Position {
    /// Current notional value of the position at `price`
    pub fn notional(&self, price: f64) -> f64 {
        self.quantity * price
    }

    /// Unrealized profit/loss fraction relative to entry
    pub fn pnl_fraction(&self, price: f64) -> f64 {
        (price - self.entry_price) / self.entry_price
    }
}

/// Cumulative performance statistics
///
/// Invariant: winning_trades + losing_trades == total_trades. All three
/// counters move together inside `TradingSession::close_at`, so a snapshot
/// can never observe a partial update.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TradeStats {
    pub total_trades: u32,
    pub winning_trades: u32,
    pub losing_trades: u32,
    pub total_profit_loss: f64,
}

impl TradeStats {
    pub fn win_rate(&self) -> f64 {
        if self.total_trades == 0 {
            return 0.0;
        }
        self.winning_trades as f64 / self.total_trades as f64 * 100.0
    }

    pub fn avg_profit_loss(&self) -> f64 {
        if self.total_trades == 0 {
            return 0.0;
        }
        self.total_profit_loss / self.total_trades as f64
    }
}

/// A completed round trip, returned by `close`
#[derive(Debug, Clone)]
pub struct ClosedTrade {
    pub entry_price: f64,
    pub exit_price: f64,
    pub quantity: f64,
    pub pnl: f64,
    pub pnl_fraction: f64,
    pub opened_at: DateTime<Utc>,
    pub closed_at: DateTime<Utc>,
}

/// Consistent read-only view for status reporting
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub position: Option<Position>,
    pub stats: TradeStats,
}

/// Owned trading state: the flat/long position slot, cumulative stats,
/// and the cooldown anchor
///
/// Single writer: only the decision loop mutates a session. The status
/// task reads through `snapshot()` under the same lock.
#[derive(Debug, Default)]
pub struct TradingSession {
    position: Option<Position>,
    stats: TradeStats,
    /// Entry time of the most recent position, kept after close so the
    /// cooldown window survives the exit
    last_trade_time: Option<DateTime<Utc>>,
}

impl TradingSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_open(&self) -> bool {
        self.position.is_some()
    }

    pub fn position(&self) -> Option<&Position> {
        self.position.as_ref()
    }

    pub fn stats(&self) -> &TradeStats {
        &self.stats
    }

    /// Open a position at `entry_price` for `quantity` units
    pub fn open(&mut self, entry_price: f64, quantity: f64) -> Result<(), BotError> {
        self.open_at(entry_price, quantity, Utc::now())
    }

    /// Open with an explicit timestamp (simulated time in tests)
    pub fn open_at(
        &mut self,
        entry_price: f64,
        quantity: f64,
        opened_at: DateTime<Utc>,
    ) -> Result<(), BotError> {
        if self.position.is_some() {
            return Err(BotError::AlreadyOpen);
        }

        self.position = Some(Position {
            entry_price,
            quantity,
            opened_at,
        });
        self.last_trade_time = Some(opened_at);
        Ok(())
    }

    /// Close the open position at `exit_price`, realizing profit/loss
    ///
    /// Wins require PL > 0; a break-even exit counts as a loss.
    pub fn close(&mut self, exit_price: f64) -> Result<ClosedTrade, BotError> {
        self.close_at(exit_price, Utc::now())
    }

    /// Close with an explicit timestamp (simulated time in tests)
    pub fn close_at(
        &mut self,
        exit_price: f64,
        closed_at: DateTime<Utc>,
    ) -> Result<ClosedTrade, BotError> {
        let position = self.position.take().ok_or(BotError::NotOpen)?;

        let pnl = (exit_price - position.entry_price) * position.quantity;
        let pnl_fraction = (exit_price - position.entry_price) / position.entry_price;

        self.stats.total_trades += 1;
        if pnl > 0.0 {
            self.stats.winning_trades += 1;
        } else {
            self.stats.losing_trades += 1;
        }
        self.stats.total_profit_loss += pnl;

        Ok(ClosedTrade {
            entry_price: position.entry_price,
            exit_price,
            quantity: position.quantity,
            pnl,
            pnl_fraction,
            opened_at: position.opened_at,
            closed_at,
        })
    }

    /// Time remaining before the cooldown window allows a new entry
    ///
    /// None once elapsed, or before the first trade.
    pub fn cooldown_remaining(&self, now: DateTime<Utc>, cooldown: Duration) -> Option<Duration> {
        let anchor = self.last_trade_time?;
        let elapsed = now - anchor;
        if elapsed >= cooldown {
            None
        } else {
            Some(cooldown - elapsed)
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            position: self.position.clone(),
            stats: self.stats.clone(),
        }
    }
}
