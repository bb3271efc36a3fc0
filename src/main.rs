use std::sync::Arc;

use anyhow::Context;
use tokio::sync::watch;

use pibot::config::{OkxCredentials, TelegramConfig, TradingConfig};
use pibot::engine::TradingEngine;
use pibot::exchange::OkxClient;
use pibot::notify::{CommandListener, MessageComposer, TelegramNotifier};
use pibot::strategy::SignalConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    setup_logging();

    tracing::info!("🤖 Trading bot starting");

    let config = TradingConfig::from_env().context("invalid trading configuration")?;
    let credentials = OkxCredentials::from_env().context("missing OKX credentials")?;
    let telegram = TelegramConfig::from_env().context("missing Telegram configuration")?;

    tracing::info!("📊 Configuration:");
    tracing::info!("  Symbol: {}", config.symbol);
    tracing::info!("  Order Fraction: {}", config.order_fraction);
    tracing::info!("  Profit Threshold: {}%", config.profit_threshold * 100.0);
    tracing::info!("  Stop Loss: {}%", config.stop_loss * 100.0);
    tracing::info!("  Cooldown: {}s", config.cooldown_secs);
    tracing::info!("  Poll Interval: {}s", config.poll_interval_secs);

    let venue = Arc::new(OkxClient::new(credentials)?);
    let notifier = TelegramNotifier::new(&telegram)?;

    let engine = TradingEngine::new(
        config.clone(),
        SignalConfig::default(),
        venue.clone(),
        notifier.clone(),
        MessageComposer::new(),
    );
    let session = engine.session_handle();

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let mut engine_task = tokio::spawn(engine.run(shutdown_rx.clone()));

    let listener = CommandListener::new(
        TelegramNotifier::new(&telegram)?,
        MessageComposer::new(),
    );
    let quote_ccy = config.symbol.split('-').nth(1).unwrap_or("USD").to_string();
    let mut listener_task = tokio::spawn(listener.run(
        venue,
        session,
        config.symbol.clone(),
        quote_ccy,
        shutdown_rx,
    ));

    tracing::info!("✅ Engine and command listener running. Press Ctrl+C to stop...");

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("⚠️  Received Ctrl+C, shutting down...");
            let _ = shutdown_tx.send(true);
            let _ = tokio::join!(&mut engine_task, &mut listener_task);
        }
        result = &mut engine_task => {
            tracing::error!("trading engine exited unexpectedly: {:?}", result);
        }
        result = &mut listener_task => {
            tracing::error!("command listener exited unexpectedly: {:?}", result);
        }
    }

    tracing::info!("👋 Trading bot stopped");
    Ok(())
}

fn setup_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "pibot=info".to_string()),
        )
        .init();
}
