// Decision loop
//
// One cooperative task owns all trade-affecting state transitions. Each
// `tick()` performs exactly one evaluation cycle; `run()` owns the pacing
// (poll sleep vs. retry sleep) and the shutdown signal, so every decision
// path can be driven in tests without real time.

use std::sync::{Arc, Mutex};

use chrono::{Duration, Utc};
use tokio::sync::watch;

use crate::config::TradingConfig;
use crate::error::BotError;
use crate::exchange::Venue;
use crate::models::{BarInterval, Candle};
use crate::notify::{BotEvent, MessageComposer, Notifier};
use crate::session::TradingSession;
use crate::strategy::{
    evaluate_entry, evaluate_exit, stop_fraction, ExitReason, SignalConfig,
};

// Candle window fetched per cycle; covers the 50-period long SMA with slack
const CANDLE_WINDOW: usize = 100;

/// Why a cycle ended without a transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HoldReason {
    NoSignal,
    Cooldown,
    InsufficientFunds,
    DustPosition,
}

/// Result of one evaluation cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Flat → long transition completed
    Entered,
    /// Long → flat transition completed
    Exited(ExitReason),
    /// No transition this cycle
    Held(HoldReason),
    /// Gateway or indicator failure; caller should back off
    Faulted,
}

/// The polling trading engine
///
/// Pulls market data through the venue, consults the gating predicates,
/// mutates the session, and pushes events through the notifier. Nothing
/// calls back into it.
pub struct TradingEngine<V, N> {
    config: TradingConfig,
    signals: SignalConfig,
    venue: Arc<V>,
    notifier: N,
    composer: MessageComposer,
    session: Arc<Mutex<TradingSession>>,
    quote_ccy: String,
}

impl<V: Venue, N: Notifier> TradingEngine<V, N> {
    pub fn new(
        config: TradingConfig,
        signals: SignalConfig,
        venue: Arc<V>,
        notifier: N,
        composer: MessageComposer,
    ) -> Self {
        let quote_ccy = config
            .symbol
            .split('-')
            .nth(1)
            .unwrap_or("USD")
            .to_string();

        Self {
            config,
            signals,
            venue,
            notifier,
            composer,
            session: Arc::new(Mutex::new(TradingSession::new())),
            quote_ccy,
        }
    }

    /// Shared handle for the status task
    pub fn session_handle(&self) -> Arc<Mutex<TradingSession>> {
        self.session.clone()
    }

    /// Deliver an event; delivery failures are logged, never escalated
    async fn emit(&mut self, event: BotEvent) {
        let text = self.composer.compose(&event);
        if let Err(e) = self.notifier.notify(&text).await {
            tracing::warn!("notification delivery failed: {}", e);
        }
    }

    async fn fault(&mut self, event: BotEvent, err: BotError) -> CycleOutcome {
        tracing::error!("cycle fault: {}", err);
        self.emit(event).await;
        CycleOutcome::Faulted
    }

    /// Run one evaluation cycle
    pub async fn tick(&mut self) -> CycleOutcome {
        let candles = match self
            .venue
            .fetch_candles(&self.config.symbol, BarInterval::Min1, CANDLE_WINDOW)
            .await
        {
            Ok(candles) => candles,
            Err(e) => return self.fault(BotEvent::MarketDataError, e).await,
        };

        let price = match self.venue.fetch_price(&self.config.symbol).await {
            Ok(price) => price,
            Err(e) => return self.fault(BotEvent::MarketDataError, e).await,
        };

        let is_open = self.session.lock().unwrap().is_open();
        if is_open {
            self.tick_long(price, &candles).await
        } else {
            self.tick_flat(price, &candles).await
        }
    }

    /// FLAT state: evaluate the entry gate
    async fn tick_flat(&mut self, price: f64, candles: &[Candle]) -> CycleOutcome {
        let evaluation = match evaluate_entry(candles, &self.signals) {
            Ok(evaluation) => evaluation,
            Err(e) => return self.fault(BotEvent::MarketDataError, e).await,
        };

        tracing::debug!(
            rsi = evaluation.rsi,
            trending_up = evaluation.trending_up,
            price,
            "entry evaluation"
        );

        if !evaluation.signals_entry(&self.signals) {
            return CycleOutcome::Held(HoldReason::NoSignal);
        }

        // Signal fired; cooldown may still block the entry
        let cooldown = Duration::seconds(self.config.cooldown_secs as i64);
        let remaining = self
            .session
            .lock()
            .unwrap()
            .cooldown_remaining(Utc::now(), cooldown);
        if let Some(remaining) = remaining {
            tracing::info!(
                "entry signal during cooldown, {}s remaining",
                remaining.num_seconds()
            );
            self.emit(BotEvent::CooldownActive {
                remaining_secs: remaining.num_seconds(),
            })
            .await;
            return CycleOutcome::Held(HoldReason::Cooldown);
        }

        let balance = match self.venue.fetch_balance(&self.quote_ccy).await {
            Ok(balance) => balance,
            Err(e) => return self.fault(BotEvent::BalanceError, e).await,
        };

        let notional = balance * self.config.order_fraction;
        if notional < self.config.min_order_notional {
            tracing::info!(
                "entry skipped: notional ${:.2} below minimum ${:.2}",
                notional,
                self.config.min_order_notional
            );
            self.emit(BotEvent::InsufficientFunds {
                notional,
                minimum: self.config.min_order_notional,
            })
            .await;
            return CycleOutcome::Held(HoldReason::InsufficientFunds);
        }

        if let Err(e) = self
            .venue
            .place_market_buy(&self.config.symbol, notional)
            .await
        {
            return self.fault(BotEvent::OrderError, e).await;
        }

        let quantity = notional / price;
        let opened = { self.session.lock().unwrap().open(price, quantity) };
        if let Err(e) = opened {
            // The engine's own gating should make this unreachable
            tracing::error!("position state error after buy: {}", e);
            self.emit(BotEvent::OrderError).await;
            return CycleOutcome::Faulted;
        }

        tracing::info!(
            "entered long: {:.4} units @ ${:.4} (${:.2})",
            quantity,
            price,
            notional
        );
        self.emit(BotEvent::BuyExecuted {
            price,
            notional,
            quantity,
        })
        .await;
        CycleOutcome::Entered
    }

    /// LONG state: evaluate take-profit and the dynamic stop
    async fn tick_long(&mut self, price: f64, candles: &[Candle]) -> CycleOutcome {
        let (entry_price, quantity, pnl_fraction, position_notional) = {
            let session = self.session.lock().unwrap();
            match session.position() {
                Some(p) => (
                    p.entry_price,
                    p.quantity,
                    p.pnl_fraction(price),
                    p.notional(price),
                ),
                None => {
                    tracing::error!("long tick with no position; skipping cycle");
                    return CycleOutcome::Faulted;
                }
            }
        };

        let stop = stop_fraction(candles, entry_price, self.config.stop_loss, &self.signals);
        tracing::debug!(
            price,
            entry_price,
            pnl_pct = pnl_fraction * 100.0,
            stop_pct = stop * 100.0,
            "exit evaluation"
        );

        let Some(reason) = evaluate_exit(pnl_fraction, self.config.profit_threshold, stop) else {
            return CycleOutcome::Held(HoldReason::NoSignal);
        };

        if position_notional < self.config.min_order_notional {
            tracing::warn!(
                "exit signal but position ${:.2} is below minimum ${:.2}",
                position_notional,
                self.config.min_order_notional
            );
            self.emit(BotEvent::DustPosition {
                notional: position_notional,
                minimum: self.config.min_order_notional,
            })
            .await;
            return CycleOutcome::Held(HoldReason::DustPosition);
        }

        // The sell goes to the venue before the session is touched; a
        // rejected order leaves the position tracked as-is
        if let Err(e) = self
            .venue
            .place_market_sell(&self.config.symbol, quantity)
            .await
        {
            return self.fault(BotEvent::OrderError, e).await;
        }

        let closed = { self.session.lock().unwrap().close(price) };
        let trade = match closed {
            Ok(trade) => trade,
            Err(e) => {
                tracing::error!("position state error after sell: {}", e);
                self.emit(BotEvent::OrderError).await;
                return CycleOutcome::Faulted;
            }
        };

        tracing::info!(
            "exited long ({:?}): PL ${:.2} ({:+.2}%)",
            reason,
            trade.pnl,
            trade.pnl_fraction * 100.0
        );
        let event = match reason {
            ExitReason::TakeProfit => BotEvent::SellProfit {
                pnl: trade.pnl,
                pnl_fraction: trade.pnl_fraction,
            },
            ExitReason::StopLoss => BotEvent::SellStopLoss {
                pnl: trade.pnl,
                pnl_fraction: trade.pnl_fraction,
            },
        };
        self.emit(event).await;
        CycleOutcome::Exited(reason)
    }

    /// Poll until the shutdown signal flips
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        tracing::info!("trading engine started for {}", self.config.symbol);
        self.emit(BotEvent::Greeting).await;

        loop {
            let outcome = self.tick().await;
            tracing::debug!(?outcome, "cycle complete");

            let delay_secs = match outcome {
                CycleOutcome::Faulted => self.config.retry_delay_secs,
                _ => self.config.poll_interval_secs,
            };

            tokio::select! {
                _ = tokio::time::sleep(std::time::Duration::from_secs(delay_secs)) => {}
                _ = shutdown.changed() => {
                    tracing::info!("shutdown signal received, stopping engine");
                    break;
                }
            }
        }
    }
}
