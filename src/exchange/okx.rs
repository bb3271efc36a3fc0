use std::num::NonZeroU32;
use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use chrono::{TimeZone, Utc};
use governor::{Quota, RateLimiter};
use hmac::{Hmac, Mac};
use reqwest::{Client, Method};
use serde::Deserialize;
use sha2::Sha256;

use crate::config::OkxCredentials;
use crate::error::BotError;
use crate::models::{BarInterval, Candle, OrderSide};

use super::Venue;

type HmacSha256 = Hmac<Sha256>;

const REQUEST_TIMEOUT_SECS: u64 = 30;
const MAX_RETRIES: u32 = 3;
// OKX allows 20 requests per 2s on market endpoints; stay well under it
const RATE_LIMIT_RPS: u32 = 5;

type OkxRateLimiter = RateLimiter<
    governor::state::direct::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// OKX v5 REST client
///
/// Private endpoints are signed with the key/secret/passphrase triple;
/// market-data endpoints go out unsigned. All requests pass the shared
/// rate limiter first and retry with exponential backoff on 429/5xx.
///
/// Cloneable; clones share the rate limiter.
#[derive(Clone)]
pub struct OkxClient {
    client: Client,
    credentials: OkxCredentials,
    rate_limiter: Arc<OkxRateLimiter>,
}

// ============== Response Types ==============

#[derive(Debug, Deserialize)]
struct OkxResponse<T> {
    code: String,
    msg: String,
    data: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct TickerData {
    last: String,
}

#[derive(Debug, Deserialize)]
struct BalanceData {
    details: Vec<BalanceDetail>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BalanceDetail {
    ccy: String,
    avail_bal: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OrderData {
    ord_id: String,
    s_code: String,
    #[serde(default)]
    s_msg: String,
}

// ============== Implementation ==============

impl OkxClient {
    pub fn new(credentials: OkxCredentials) -> Result<Self, BotError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| BotError::Config(format!("failed to build HTTP client: {}", e)))?;

        let quota = Quota::per_second(NonZeroU32::new(RATE_LIMIT_RPS).unwrap());

        Ok(Self {
            client,
            credentials,
            rate_limiter: Arc::new(RateLimiter::direct(quota)),
        })
    }

    /// ISO 8601 timestamp with millisecond precision, as OKX expects it
    fn timestamp() -> String {
        Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
    }

    /// base64(HMAC-SHA256(secret, timestamp + method + path + body))
    fn sign(&self, timestamp: &str, method: &Method, path: &str, body: &str) -> String {
        let payload = format!("{}{}{}{}", timestamp, method.as_str(), path, body);
        let mut mac = HmacSha256::new_from_slice(self.credentials.secret.as_bytes())
            .expect("HMAC accepts keys of any length");
        mac.update(payload.as_bytes());
        BASE64.encode(mac.finalize().into_bytes())
    }

    /// Rate-limited request with bounded retries
    ///
    /// `path` includes the query string; it is what gets signed. Retries
    /// re-sign each attempt so the timestamp stays fresh.
    async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<String>,
        signed: bool,
    ) -> Result<reqwest::Response, String> {
        let url = format!("{}{}", self.credentials.base_url, path);
        let body_str = body.unwrap_or_default();

        for attempt in 1..=MAX_RETRIES {
            self.rate_limiter.until_ready().await;

            let mut request = self.client.request(method.clone(), &url);
            if signed {
                let timestamp = Self::timestamp();
                let signature = self.sign(&timestamp, &method, path, &body_str);
                request = request
                    .header("OK-ACCESS-KEY", &self.credentials.api_key)
                    .header("OK-ACCESS-SIGN", signature)
                    .header("OK-ACCESS-TIMESTAMP", timestamp)
                    .header("OK-ACCESS-PASSPHRASE", &self.credentials.passphrase);
            }
            if !body_str.is_empty() {
                request = request
                    .header("Content-Type", "application/json")
                    .body(body_str.clone());
            }

            match request.send().await {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        return Ok(response);
                    }

                    if (status.as_u16() == 429 || status.is_server_error())
                        && attempt < MAX_RETRIES
                    {
                        let backoff_secs = 2u64.pow(attempt);
                        tracing::warn!(
                            "OKX returned {}, backing off for {}s (attempt {}/{})",
                            status,
                            backoff_secs,
                            attempt,
                            MAX_RETRIES
                        );
                        tokio::time::sleep(std::time::Duration::from_secs(backoff_secs)).await;
                        continue;
                    }

                    let error_text = response
                        .text()
                        .await
                        .unwrap_or_else(|_| "unknown error".to_string());
                    return Err(format!("OKX API error ({}): {}", status, error_text));
                }
                Err(e) if attempt < MAX_RETRIES => {
                    let backoff_secs = 2u64.pow(attempt);
                    tracing::warn!(
                        "network error: {}, retrying in {}s (attempt {}/{})",
                        e,
                        backoff_secs,
                        attempt,
                        MAX_RETRIES
                    );
                    tokio::time::sleep(std::time::Duration::from_secs(backoff_secs)).await;
                }
                Err(e) => return Err(format!("network error after {} retries: {}", MAX_RETRIES, e)),
            }
        }

        Err(format!("failed after {} retries", MAX_RETRIES))
    }

    /// Decode the OKX envelope, treating a non-zero code as failure
    async fn decode<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<Vec<T>, String> {
        let envelope: OkxResponse<T> = response
            .json()
            .await
            .map_err(|e| format!("failed to parse response: {}", e))?;

        if envelope.code != "0" {
            return Err(format!("OKX error {}: {}", envelope.code, envelope.msg));
        }
        Ok(envelope.data)
    }

    async fn submit_order(
        &self,
        symbol: &str,
        side: OrderSide,
        size: f64,
        target_ccy: Option<&str>,
    ) -> Result<String, String> {
        let client_order_id = uuid::Uuid::new_v4().simple().to_string();
        let mut order = serde_json::json!({
            "instId": symbol,
            "tdMode": "cash",
            "clOrdId": client_order_id,
            "side": side.as_str(),
            "ordType": "market",
            "sz": format!("{}", size),
        });
        if let Some(ccy) = target_ccy {
            order["tgtCcy"] = serde_json::Value::String(ccy.to_string());
        }

        let path = "/api/v5/trade/order";
        let response = self
            .request(Method::POST, path, Some(order.to_string()), true)
            .await?;
        let data: Vec<OrderData> = Self::decode(response).await?;

        let order_result = data
            .into_iter()
            .next()
            .ok_or_else(|| "empty order response".to_string())?;

        if order_result.s_code != "0" {
            return Err(format!(
                "order rejected ({}): {}",
                order_result.s_code, order_result.s_msg
            ));
        }

        tracing::info!(
            side = side.as_str(),
            size,
            order_id = %order_result.ord_id,
            "order accepted"
        );
        Ok(order_result.ord_id)
    }
}

#[async_trait::async_trait]
impl Venue for OkxClient {
    async fn fetch_price(&self, symbol: &str) -> Result<f64, BotError> {
        let path = format!("/api/v5/market/ticker?instId={}", symbol);
        let response = self
            .request(Method::GET, &path, None, false)
            .await
            .map_err(BotError::MarketDataUnavailable)?;
        let data: Vec<TickerData> = Self::decode(response)
            .await
            .map_err(BotError::MarketDataUnavailable)?;

        let ticker = data
            .first()
            .ok_or_else(|| BotError::MarketDataUnavailable("empty ticker response".to_string()))?;
        ticker
            .last
            .parse::<f64>()
            .map_err(|e| BotError::MarketDataUnavailable(format!("bad last price: {}", e)))
    }

    async fn fetch_balance(&self, currency: &str) -> Result<f64, BotError> {
        let path = format!("/api/v5/account/balance?ccy={}", currency);
        let response = self
            .request(Method::GET, &path, None, true)
            .await
            .map_err(BotError::BalanceUnavailable)?;
        let data: Vec<BalanceData> = Self::decode(response)
            .await
            .map_err(BotError::BalanceUnavailable)?;

        // No entry for the currency means a zero balance, not a failure
        let available = data
            .first()
            .and_then(|account| account.details.iter().find(|d| d.ccy == currency))
            .map(|detail| detail.avail_bal.parse::<f64>())
            .transpose()
            .map_err(|e| BotError::BalanceUnavailable(format!("bad balance value: {}", e)))?
            .unwrap_or(0.0);

        Ok(available)
    }

    async fn fetch_candles(
        &self,
        symbol: &str,
        interval: BarInterval,
        limit: usize,
    ) -> Result<Vec<Candle>, BotError> {
        let path = format!(
            "/api/v5/market/candles?instId={}&bar={}&limit={}",
            symbol,
            interval.as_str(),
            limit
        );
        let response = self
            .request(Method::GET, &path, None, false)
            .await
            .map_err(BotError::MarketDataUnavailable)?;
        let rows: Vec<Vec<String>> = Self::decode(response)
            .await
            .map_err(BotError::MarketDataUnavailable)?;

        let mut candles: Vec<Candle> = rows
            .iter()
            .filter_map(|row| {
                if row.len() < 6 {
                    return None;
                }
                let ts_ms: i64 = row[0].parse().ok()?;
                let timestamp = Utc.timestamp_millis_opt(ts_ms).single()?;
                Some(Candle {
                    timestamp,
                    open: row[1].parse().ok()?,
                    high: row[2].parse().ok()?,
                    low: row[3].parse().ok()?,
                    close: row[4].parse().ok()?,
                    volume: row[5].parse().ok()?,
                })
            })
            .collect();

        // OKX returns newest first; the rest of the crate wants oldest first
        candles.reverse();
        Ok(candles)
    }

    async fn place_market_buy(&self, symbol: &str, notional: f64) -> Result<String, BotError> {
        // Market buys are sized in quote currency
        self.submit_order(symbol, OrderSide::Buy, notional, Some("quote_ccy"))
            .await
            .map_err(BotError::OrderFailed)
    }

    async fn place_market_sell(&self, symbol: &str, quantity: f64) -> Result<String, BotError> {
        self.submit_order(symbol, OrderSide::Sell, quantity, None)
            .await
            .map_err(BotError::OrderFailed)
    }
}
