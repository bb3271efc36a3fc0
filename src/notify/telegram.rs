use std::sync::{Arc, Mutex};

use reqwest::Client;
use serde::Deserialize;
use tokio::sync::watch;

use crate::config::TelegramConfig;
use crate::error::BotError;
use crate::exchange::Venue;
use crate::notify::persona::MessageComposer;
use crate::notify::Notifier;
use crate::session::{SessionSnapshot, TradingSession};

const TELEGRAM_API_BASE: &str = "https://api.telegram.org";
// Long-poll window; the HTTP timeout must outlast it
const POLL_TIMEOUT_SECS: u64 = 30;
const HTTP_TIMEOUT_SECS: u64 = 40;
const POLL_ERROR_BACKOFF_SECS: u64 = 5;

/// Telegram Bot API message sender
#[derive(Clone)]
pub struct TelegramNotifier {
    client: Client,
    base_url: String,
    token: String,
    chat_id: String,
}

#[derive(Debug, Deserialize)]
struct SendMessageResponse {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

impl TelegramNotifier {
    pub fn new(config: &TelegramConfig) -> Result<Self, BotError> {
        Self::with_base_url(config, TELEGRAM_API_BASE.to_string())
    }

    pub fn with_base_url(config: &TelegramConfig, base_url: String) -> Result<Self, BotError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(HTTP_TIMEOUT_SECS))
            .build()
            .map_err(|e| BotError::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url,
            token: config.token.clone(),
            chat_id: config.chat_id.clone(),
        })
    }

    fn api_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.base_url, self.token, method)
    }

    async fn send_to(&self, chat_id: &str, text: &str) -> Result<(), BotError> {
        let response = self
            .client
            .post(self.api_url("sendMessage"))
            .json(&serde_json::json!({
                "chat_id": chat_id,
                "text": text,
            }))
            .send()
            .await
            .map_err(|e| BotError::DeliveryFailed(e.to_string()))?;

        let status = response.status();
        let body: SendMessageResponse = response
            .json()
            .await
            .map_err(|e| BotError::DeliveryFailed(format!("bad response ({}): {}", status, e)))?;

        if !body.ok {
            return Err(BotError::DeliveryFailed(
                body.description
                    .unwrap_or_else(|| format!("HTTP {}", status)),
            ));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl Notifier for TelegramNotifier {
    async fn notify(&self, text: &str) -> Result<(), BotError> {
        self.send_to(&self.chat_id, text).await
    }
}

// ============== /status command ==============

#[derive(Debug, Deserialize)]
struct UpdatesResponse {
    ok: bool,
    #[serde(default)]
    result: Vec<Update>,
}

#[derive(Debug, Deserialize)]
struct Update {
    update_id: i64,
    message: Option<IncomingMessage>,
}

#[derive(Debug, Deserialize)]
struct IncomingMessage {
    chat: Chat,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Chat {
    id: i64,
}

/// Long-polls Telegram for commands and answers `/status`
///
/// Runs as its own cooperative task; it only ever reads the session
/// through `snapshot()`, so it can never observe a half-applied trade.
pub struct CommandListener {
    notifier: TelegramNotifier,
    composer: MessageComposer,
}

impl CommandListener {
    pub fn new(notifier: TelegramNotifier, composer: MessageComposer) -> Self {
        Self { notifier, composer }
    }

    async fn poll_updates(&self, offset: i64) -> Result<Vec<Update>, BotError> {
        let response = self
            .notifier
            .client
            .get(self.notifier.api_url("getUpdates"))
            .query(&[
                ("timeout", POLL_TIMEOUT_SECS.to_string()),
                ("offset", offset.to_string()),
            ])
            .send()
            .await
            .map_err(|e| BotError::DeliveryFailed(e.to_string()))?;

        let body: UpdatesResponse = response
            .json()
            .await
            .map_err(|e| BotError::DeliveryFailed(format!("bad updates response: {}", e)))?;

        if !body.ok {
            return Err(BotError::DeliveryFailed("getUpdates returned ok=false".to_string()));
        }
        Ok(body.result)
    }

    async fn answer_status<V: Venue>(
        &mut self,
        chat_id: i64,
        venue: &V,
        session: &Mutex<TradingSession>,
        symbol: &str,
        quote_ccy: &str,
    ) {
        let price = venue.fetch_price(symbol).await.ok();
        let balance = venue.fetch_balance(quote_ccy).await.ok();
        let snapshot = session.lock().unwrap().snapshot();
        let mood = self.composer.status_mood(snapshot.stats.total_profit_loss);

        let report = format_status_report(symbol, quote_ccy, price, balance, &snapshot, mood);
        if let Err(e) = self.notifier.send_to(&chat_id.to_string(), &report).await {
            tracing::warn!("failed to deliver status report: {}", e);
        }
    }

    /// Poll until the shutdown signal flips
    pub async fn run<V: Venue>(
        mut self,
        venue: Arc<V>,
        session: Arc<Mutex<TradingSession>>,
        symbol: String,
        quote_ccy: String,
        mut shutdown: watch::Receiver<bool>,
    ) {
        tracing::info!("command listener started");
        let mut offset = 0i64;

        loop {
            tokio::select! {
                result = self.poll_updates(offset) => match result {
                    Ok(updates) => {
                        for update in updates {
                            offset = offset.max(update.update_id + 1);

                            let Some(message) = update.message else { continue };
                            let Some(text) = message.text.as_deref() else { continue };

                            if text.trim() == "/status" {
                                self.answer_status(
                                    message.chat.id,
                                    venue.as_ref(),
                                    &session,
                                    &symbol,
                                    &quote_ccy,
                                )
                                .await;
                            }
                        }
                    }
                    Err(e) => {
                        tracing::warn!("getUpdates failed: {}", e);
                        tokio::select! {
                            _ = tokio::time::sleep(std::time::Duration::from_secs(POLL_ERROR_BACKOFF_SECS)) => {}
                            _ = shutdown.changed() => break,
                        }
                    }
                },
                _ = shutdown.changed() => break,
            }
        }

        tracing::info!("command listener stopped");
    }
}

/// Human-readable status report, one line per metric
pub fn format_status_report(
    symbol: &str,
    quote_ccy: &str,
    price: Option<f64>,
    balance: Option<f64>,
    snapshot: &SessionSnapshot,
    mood: &str,
) -> String {
    let base_ccy = symbol.split('-').next().unwrap_or(symbol);
    let stats = &snapshot.stats;

    let price_line = match price {
        Some(p) => format!("${:.4}", p),
        None => "unavailable".to_string(),
    };
    let balance_line = match balance {
        Some(b) => format!("${:.2}", b),
        None => "unavailable".to_string(),
    };
    let position_line = match &snapshot.position {
        Some(p) => format!("long {:.4} @ ${:.4}", p.quantity, p.entry_price),
        None => "flat".to_string(),
    };

    let mut report = format!(
        "📊 Status Report - {}\n{}\n\n",
        chrono::Utc::now().format("%H:%M:%S"),
        mood
    );
    report += &format!("🔹 {} Price: {}\n", base_ccy, price_line);
    report += &format!("🔹 {} Balance: {}\n", quote_ccy, balance_line);
    report += &format!("🔹 Position: {}\n", position_line);
    report += &format!("🔹 Total Trades: {}\n", stats.total_trades);
    report += &format!("🔹 Winning Trades: {}\n", stats.winning_trades);
    report += &format!("🔹 Losing Trades: {}\n", stats.losing_trades);
    report += &format!("🔹 Win Rate: {:.2}%\n", stats.win_rate());
    report += &format!("🔹 Total Profit/Loss: ${:.2}\n", stats.total_profit_loss);
    report += &format!(
        "🔹 Avg Profit/Loss per Trade: ${:.2}\n",
        stats.avg_profit_loss()
    );
    report
}
