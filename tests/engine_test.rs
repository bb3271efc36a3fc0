use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::watch;

use pibot::config::TradingConfig;
use pibot::engine::{CycleOutcome, HoldReason, TradingEngine};
use pibot::error::BotError;
use pibot::exchange::Venue;
use pibot::models::{BarInterval, Candle};
use pibot::notify::{MessageComposer, Notifier};
use pibot::strategy::{ExitReason, SignalConfig};

// ============== Mocks ==============

/// Scripted venue: tests set price/balance/candles between ticks and
/// inspect the orders the engine placed.
#[derive(Default)]
struct MockVenue {
    price: Mutex<f64>,
    balance: Mutex<f64>,
    candles: Mutex<Vec<Candle>>,
    fail_market_data: Mutex<bool>,
    fail_balance: Mutex<bool>,
    fail_orders: Mutex<bool>,
    buys: Mutex<Vec<f64>>,
    sells: Mutex<Vec<f64>>,
}

impl MockVenue {
    fn set_price(&self, price: f64) {
        *self.price.lock().unwrap() = price;
    }

    fn set_balance(&self, balance: f64) {
        *self.balance.lock().unwrap() = balance;
    }

    fn set_candles(&self, candles: Vec<Candle>) {
        *self.candles.lock().unwrap() = candles;
    }

    fn set_market_data_failing(&self, failing: bool) {
        *self.fail_market_data.lock().unwrap() = failing;
    }

    fn buy_count(&self) -> usize {
        self.buys.lock().unwrap().len()
    }

    fn sell_count(&self) -> usize {
        self.sells.lock().unwrap().len()
    }
}

#[async_trait]
impl Venue for MockVenue {
    async fn fetch_price(&self, _symbol: &str) -> Result<f64, BotError> {
        if *self.fail_market_data.lock().unwrap() {
            return Err(BotError::MarketDataUnavailable("scripted outage".to_string()));
        }
        Ok(*self.price.lock().unwrap())
    }

    async fn fetch_balance(&self, _currency: &str) -> Result<f64, BotError> {
        if *self.fail_balance.lock().unwrap() {
            return Err(BotError::BalanceUnavailable("scripted outage".to_string()));
        }
        Ok(*self.balance.lock().unwrap())
    }

    async fn fetch_candles(
        &self,
        _symbol: &str,
        _interval: BarInterval,
        _limit: usize,
    ) -> Result<Vec<Candle>, BotError> {
        if *self.fail_market_data.lock().unwrap() {
            return Err(BotError::MarketDataUnavailable("scripted outage".to_string()));
        }
        Ok(self.candles.lock().unwrap().clone())
    }

    async fn place_market_buy(&self, _symbol: &str, notional: f64) -> Result<String, BotError> {
        if *self.fail_orders.lock().unwrap() {
            return Err(BotError::OrderFailed("scripted rejection".to_string()));
        }
        self.buys.lock().unwrap().push(notional);
        Ok(format!("buy-{}", self.buy_count()))
    }

    async fn place_market_sell(&self, _symbol: &str, quantity: f64) -> Result<String, BotError> {
        if *self.fail_orders.lock().unwrap() {
            return Err(BotError::OrderFailed("scripted rejection".to_string()));
        }
        self.sells.lock().unwrap().push(quantity);
        Ok(format!("sell-{}", self.sell_count()))
    }
}

#[derive(Clone, Default)]
struct MockNotifier {
    messages: Arc<Mutex<Vec<String>>>,
}

impl MockNotifier {
    fn count(&self) -> usize {
        self.messages.lock().unwrap().len()
    }

    fn last(&self) -> Option<String> {
        self.messages.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl Notifier for MockNotifier {
    async fn notify(&self, text: &str) -> Result<(), BotError> {
        self.messages.lock().unwrap().push(text.to_string());
        Ok(())
    }
}

/// Notifier whose deliveries always fail
#[derive(Clone, Default)]
struct BrokenNotifier;

#[async_trait]
impl Notifier for BrokenNotifier {
    async fn notify(&self, _text: &str) -> Result<(), BotError> {
        Err(BotError::DeliveryFailed("scripted outage".to_string()))
    }
}

// ============== Fixtures ==============

fn candles_from_closes(closes: &[f64]) -> Vec<Candle> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| Candle {
            timestamp: Utc::now() + chrono::Duration::minutes(i as i64),
            open: close,
            high: close * 1.001,
            low: close * 0.999,
            close,
            volume: 1000.0,
        })
        .collect()
}

/// Larger uptrend with a sharp recent dip: RSI oversold, short MA above
/// long MA, so the entry gate fires.
fn entry_signal_candles() -> Vec<Candle> {
    let mut closes: Vec<f64> = (0..45).map(|i| 1.00 + i as f64 * 0.02).collect();
    for i in 0..15 {
        closes.push(1.88 - i as f64 * 0.004);
    }
    candles_from_closes(&closes)
}

/// Steady climb: uptrend but RSI pinned at 100, no entry signal.
fn no_signal_candles() -> Vec<Candle> {
    let closes: Vec<f64> = (0..60).map(|i| 1.00 + i as f64 * 0.01).collect();
    candles_from_closes(&closes)
}

fn test_config() -> TradingConfig {
    TradingConfig {
        symbol: "PI-USD".to_string(),
        order_fraction: 0.85,
        profit_threshold: 0.03,
        stop_loss: 0.035,
        cooldown_secs: 3600,
        poll_interval_secs: 60,
        retry_delay_secs: 30,
        min_order_notional: 10.0,
    }
}

fn build_engine(
    venue: Arc<MockVenue>,
    notifier: MockNotifier,
) -> TradingEngine<MockVenue, MockNotifier> {
    TradingEngine::new(
        test_config(),
        SignalConfig::default(),
        venue,
        notifier,
        MessageComposer::with_seed(42),
    )
}

// ============== Scenarios ==============

#[tokio::test]
async fn test_entry_on_oversold_uptrend() {
    let venue = Arc::new(MockVenue::default());
    venue.set_price(1.0);
    venue.set_balance(100.0);
    venue.set_candles(entry_signal_candles());

    let notifier = MockNotifier::default();
    let mut engine = build_engine(venue.clone(), notifier.clone());

    let outcome = engine.tick().await;
    assert_eq!(outcome, CycleOutcome::Entered);

    // $100 balance at 0.85 order fraction = $85 notional, 85 units at $1
    let buys = venue.buys.lock().unwrap().clone();
    assert_eq!(buys, vec![85.0]);

    let snapshot = engine.session_handle().lock().unwrap().snapshot();
    let position = snapshot.position.unwrap();
    assert_eq!(position.entry_price, 1.0);
    assert!((position.quantity - 85.0).abs() < 1e-9);

    // Buy notification delivered
    assert!(notifier.count() >= 1);
}

#[tokio::test]
async fn test_no_entry_without_signal() {
    let venue = Arc::new(MockVenue::default());
    venue.set_price(1.0);
    venue.set_balance(100.0);
    venue.set_candles(no_signal_candles());

    let mut engine = build_engine(venue.clone(), MockNotifier::default());

    let outcome = engine.tick().await;
    assert_eq!(outcome, CycleOutcome::Held(HoldReason::NoSignal));
    assert_eq!(venue.buy_count(), 0);
}

#[tokio::test]
async fn test_never_double_buys() {
    let venue = Arc::new(MockVenue::default());
    venue.set_price(1.0);
    venue.set_balance(100.0);
    venue.set_candles(entry_signal_candles());

    let mut engine = build_engine(venue.clone(), MockNotifier::default());

    assert_eq!(engine.tick().await, CycleOutcome::Entered);

    // Signal conditions still hold, but the engine is long now: repeated
    // polls must never issue a second buy without an intervening sell
    for _ in 0..5 {
        let outcome = engine.tick().await;
        assert_eq!(outcome, CycleOutcome::Held(HoldReason::NoSignal));
    }
    assert_eq!(venue.buy_count(), 1);
    assert_eq!(venue.sell_count(), 0);
}

#[tokio::test]
async fn test_take_profit_cycle() {
    let venue = Arc::new(MockVenue::default());
    venue.set_price(1.0);
    venue.set_balance(100.0);
    venue.set_candles(entry_signal_candles());

    let notifier = MockNotifier::default();
    let mut engine = build_engine(venue.clone(), notifier.clone());

    assert_eq!(engine.tick().await, CycleOutcome::Entered);

    // +4% beats the 3% threshold
    venue.set_price(1.04);
    let outcome = engine.tick().await;
    assert_eq!(outcome, CycleOutcome::Exited(ExitReason::TakeProfit));

    // Entire position sold
    let sells = venue.sells.lock().unwrap().clone();
    assert_eq!(sells.len(), 1);
    assert!((sells[0] - 85.0).abs() < 1e-9);

    let snapshot = engine.session_handle().lock().unwrap().snapshot();
    assert!(snapshot.position.is_none());
    assert_eq!(snapshot.stats.total_trades, 1);
    assert_eq!(snapshot.stats.winning_trades, 1);
    assert_eq!(snapshot.stats.losing_trades, 0);
    // 85 units * $0.04 = $3.40
    assert!((snapshot.stats.total_profit_loss - 3.40).abs() < 1e-9);

    assert!(notifier.last().unwrap().contains("$3.40"));
}

#[tokio::test]
async fn test_stop_loss_cycle() {
    let venue = Arc::new(MockVenue::default());
    venue.set_price(1.0);
    venue.set_balance(100.0);
    venue.set_candles(entry_signal_candles());

    let mut engine = build_engine(venue.clone(), MockNotifier::default());

    assert_eq!(engine.tick().await, CycleOutcome::Entered);

    // -4% breaches the 3.5% static stop (calm candles keep the ATR stop
    // at the static floor)
    venue.set_price(0.96);
    let outcome = engine.tick().await;
    assert_eq!(outcome, CycleOutcome::Exited(ExitReason::StopLoss));

    assert_eq!(venue.sell_count(), 1);

    let snapshot = engine.session_handle().lock().unwrap().snapshot();
    assert!(snapshot.position.is_none());
    assert_eq!(snapshot.stats.total_trades, 1);
    assert_eq!(snapshot.stats.losing_trades, 1);
    assert!(snapshot.stats.total_profit_loss < 0.0);
}

#[tokio::test]
async fn test_holds_inside_exit_band() {
    let venue = Arc::new(MockVenue::default());
    venue.set_price(1.0);
    venue.set_balance(100.0);
    venue.set_candles(entry_signal_candles());

    let mut engine = build_engine(venue.clone(), MockNotifier::default());
    assert_eq!(engine.tick().await, CycleOutcome::Entered);

    // +2% is under the threshold, -1% is above the stop
    for price in [1.02, 0.99, 1.0] {
        venue.set_price(price);
        assert_eq!(
            engine.tick().await,
            CycleOutcome::Held(HoldReason::NoSignal)
        );
    }
    assert_eq!(venue.sell_count(), 0);
}

#[tokio::test]
async fn test_insufficient_funds_skips_order() {
    let venue = Arc::new(MockVenue::default());
    venue.set_price(1.0);
    // 0.85 * $10 = $8.50, below the $10 minimum
    venue.set_balance(10.0);
    venue.set_candles(entry_signal_candles());

    let notifier = MockNotifier::default();
    let mut engine = build_engine(venue.clone(), notifier.clone());

    let outcome = engine.tick().await;
    assert_eq!(outcome, CycleOutcome::Held(HoldReason::InsufficientFunds));

    // No order, no transition, but the user heard about it
    assert_eq!(venue.buy_count(), 0);
    assert!(engine
        .session_handle()
        .lock()
        .unwrap()
        .snapshot()
        .position
        .is_none());
    assert!(notifier.last().unwrap().contains("$8.50"));
}

#[tokio::test]
async fn test_market_data_failure_then_recovery() {
    let venue = Arc::new(MockVenue::default());
    venue.set_price(1.0);
    venue.set_balance(100.0);
    venue.set_candles(no_signal_candles());
    venue.set_market_data_failing(true);

    let notifier = MockNotifier::default();
    let mut engine = build_engine(venue.clone(), notifier.clone());

    let outcome = engine.tick().await;
    assert_eq!(outcome, CycleOutcome::Faulted);
    // Exactly one error notification for the failed cycle
    assert_eq!(notifier.count(), 1);

    // Next successful poll resumes normal evaluation with state intact
    venue.set_market_data_failing(false);
    let outcome = engine.tick().await;
    assert_eq!(outcome, CycleOutcome::Held(HoldReason::NoSignal));

    let snapshot = engine.session_handle().lock().unwrap().snapshot();
    assert!(snapshot.position.is_none());
    assert_eq!(snapshot.stats.total_trades, 0);
}

#[tokio::test]
async fn test_balance_failure_aborts_entry() {
    let venue = Arc::new(MockVenue::default());
    venue.set_price(1.0);
    venue.set_candles(entry_signal_candles());
    *venue.fail_balance.lock().unwrap() = true;

    let mut engine = build_engine(venue.clone(), MockNotifier::default());

    assert_eq!(engine.tick().await, CycleOutcome::Faulted);
    assert_eq!(venue.buy_count(), 0);
}

#[tokio::test]
async fn test_rejected_buy_leaves_state_flat() {
    let venue = Arc::new(MockVenue::default());
    venue.set_price(1.0);
    venue.set_balance(100.0);
    venue.set_candles(entry_signal_candles());
    *venue.fail_orders.lock().unwrap() = true;

    let mut engine = build_engine(venue.clone(), MockNotifier::default());

    assert_eq!(engine.tick().await, CycleOutcome::Faulted);
    let snapshot = engine.session_handle().lock().unwrap().snapshot();
    assert!(snapshot.position.is_none());
    assert_eq!(snapshot.stats.total_trades, 0);
}

#[tokio::test]
async fn test_rejected_sell_keeps_position_tracked() {
    let venue = Arc::new(MockVenue::default());
    venue.set_price(1.0);
    venue.set_balance(100.0);
    venue.set_candles(entry_signal_candles());

    let mut engine = build_engine(venue.clone(), MockNotifier::default());
    assert_eq!(engine.tick().await, CycleOutcome::Entered);

    // Venue rejects the exit; the position must stay tracked so the next
    // cycle can retry instead of orphaning it
    *venue.fail_orders.lock().unwrap() = true;
    venue.set_price(1.04);
    assert_eq!(engine.tick().await, CycleOutcome::Faulted);

    let snapshot = engine.session_handle().lock().unwrap().snapshot();
    assert!(snapshot.position.is_some());
    assert_eq!(snapshot.stats.total_trades, 0);

    // Rejection cleared: the same exit goes through
    *venue.fail_orders.lock().unwrap() = false;
    assert_eq!(
        engine.tick().await,
        CycleOutcome::Exited(ExitReason::TakeProfit)
    );
}

#[tokio::test]
async fn test_cooldown_blocks_reentry() {
    let venue = Arc::new(MockVenue::default());
    venue.set_price(1.0);
    venue.set_balance(100.0);
    venue.set_candles(entry_signal_candles());

    let notifier = MockNotifier::default();
    let mut engine = build_engine(venue.clone(), notifier.clone());

    assert_eq!(engine.tick().await, CycleOutcome::Entered);
    venue.set_price(1.04);
    assert_eq!(
        engine.tick().await,
        CycleOutcome::Exited(ExitReason::TakeProfit)
    );

    // Conditions immediately favor re-entry, but the hour-long cooldown
    // anchored at the previous open must block it
    venue.set_price(1.0);
    let outcome = engine.tick().await;
    assert_eq!(outcome, CycleOutcome::Held(HoldReason::Cooldown));
    assert_eq!(venue.buy_count(), 1);
    assert!(notifier.last().unwrap().contains("remaining"));
}

#[tokio::test]
async fn test_delivery_failure_never_blocks_trading() {
    let venue = Arc::new(MockVenue::default());
    venue.set_price(1.0);
    venue.set_balance(100.0);
    venue.set_candles(entry_signal_candles());

    let mut engine = TradingEngine::new(
        test_config(),
        SignalConfig::default(),
        venue.clone(),
        BrokenNotifier,
        MessageComposer::with_seed(42),
    );

    // Every notification fails, the trade still happens
    assert_eq!(engine.tick().await, CycleOutcome::Entered);
    assert_eq!(venue.buy_count(), 1);

    venue.set_price(1.04);
    assert_eq!(
        engine.tick().await,
        CycleOutcome::Exited(ExitReason::TakeProfit)
    );
    assert_eq!(venue.sell_count(), 1);
}

#[tokio::test]
async fn test_run_stops_on_shutdown_signal() {
    let venue = Arc::new(MockVenue::default());
    venue.set_price(1.0);
    venue.set_balance(100.0);
    venue.set_candles(no_signal_candles());

    let notifier = MockNotifier::default();
    let engine = build_engine(venue, notifier.clone());

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handle = tokio::spawn(engine.run(shutdown_rx));

    // Let the loop reach its first sleep, then signal shutdown
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    shutdown_tx.send(true).unwrap();

    tokio::time::timeout(std::time::Duration::from_secs(5), handle)
        .await
        .expect("engine did not stop after shutdown signal")
        .unwrap();

    // Greeting went out when the loop started
    assert!(notifier.count() >= 1);
}
