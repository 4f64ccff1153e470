//! Binance REST kline fetcher.
//!
//! Pulls the most recent candles for a symbol and turns them into a
//! [`VolumeObservation`].

use crate::{FetchError, ObservationSource};
use async_trait::async_trait;
use chrono::DateTime;
use reqwest::StatusCode;
use std::time::Duration;
use tracing::debug;
use volume_core::{Kline, VolumeObservation};

/// Binance error code for an unknown trading pair.
const INVALID_SYMBOL_CODE: i64 = -1121;

/// Configuration for the kline source.
#[derive(Debug, Clone)]
pub struct KlineSourceConfig {
    /// REST base URL.
    pub base_url: String,
    /// Candle interval, e.g. "1h".
    pub interval: String,
    /// Number of closed candles averaged into the baseline.
    pub baseline_candles: usize,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl Default for KlineSourceConfig {
    fn default() -> Self {
        Self {
            base_url: BinanceKlineSource::BASE_URL.to_string(),
            interval: "1h".to_string(),
            baseline_candles: 6,
            timeout: Duration::from_secs(5),
        }
    }
}

/// Volume observations built from Binance spot klines.
pub struct BinanceKlineSource {
    client: reqwest::Client,
    config: KlineSourceConfig,
}

impl BinanceKlineSource {
    pub const BASE_URL: &'static str = "https://api.binance.com";

    pub fn new(config: KlineSourceConfig) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;
        Ok(Self { client, config })
    }

    /// Candles requested per symbol: the forming candle, the last closed
    /// one, the baseline window, and at least four closed candles overall.
    fn limit(&self) -> usize {
        (self.config.baseline_candles + 2).max(5)
    }

    /// Fetch recent klines, oldest first.
    pub async fn fetch_klines(&self, symbol: &str) -> Result<Vec<Kline>, FetchError> {
        let url = format!("{}/api/v3/klines", self.config.base_url);
        let limit = self.limit().to_string();

        let response = self
            .client
            .get(&url)
            .query(&[
                ("symbol", symbol),
                ("interval", self.config.interval.as_str()),
                ("limit", limit.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(error_from_response(status, &body, symbol));
        }

        let json: serde_json::Value = response.json().await?;
        parse_klines(&json)
    }
}

#[async_trait]
impl ObservationSource for BinanceKlineSource {
    async fn get_observation(&self, symbol: &str) -> Result<VolumeObservation, FetchError> {
        let klines = self.fetch_klines(symbol).await?;
        debug!(symbol = symbol, candles = klines.len(), "Fetched klines");

        VolumeObservation::from_klines(symbol, &klines, self.config.baseline_candles).ok_or_else(
            || {
                FetchError::Parse(format!(
                    "{} candles returned for {}, need {}",
                    klines.len(),
                    symbol,
                    self.config.baseline_candles + 2
                ))
            },
        )
    }
}

/// Map a non-success HTTP response to a fetch error.
fn error_from_response(status: StatusCode, body: &str, symbol: &str) -> FetchError {
    // 418 is Binance's "IP banned after repeated 429s"
    if status == StatusCode::TOO_MANY_REQUESTS || status.as_u16() == 418 {
        return FetchError::RateLimited;
    }

    let code = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v["code"].as_i64());
    if code == Some(INVALID_SYMBOL_CODE) {
        return FetchError::UnknownSymbol(symbol.to_string());
    }

    FetchError::Network(format!("HTTP {}: {}", status, body))
}

/// Parse the kline array response:
/// `[[openTime, "open", "high", "low", "close", "volume", closeTime, ...], ...]`
pub fn parse_klines(json: &serde_json::Value) -> Result<Vec<Kline>, FetchError> {
    let rows = json
        .as_array()
        .ok_or_else(|| FetchError::Parse("klines response is not an array".to_string()))?;

    rows.iter()
        .map(|row| {
            let open_time_ms = row[0]
                .as_i64()
                .ok_or_else(|| FetchError::Parse("missing open time".to_string()))?;
            let open_time = DateTime::from_timestamp_millis(open_time_ms)
                .ok_or_else(|| FetchError::Parse(format!("invalid open time {}", open_time_ms)))?;

            Ok(Kline {
                open_time,
                open: decimal_field(row, 1, "open")?,
                high: decimal_field(row, 2, "high")?,
                low: decimal_field(row, 3, "low")?,
                close: decimal_field(row, 4, "close")?,
                volume: decimal_field(row, 5, "volume")?,
            })
        })
        .collect()
}

fn decimal_field(row: &serde_json::Value, index: usize, name: &str) -> Result<f64, FetchError> {
    row[index]
        .as_str()
        .and_then(|s| s.parse::<f64>().ok())
        .ok_or_else(|| FetchError::Parse(format!("invalid {} field", name)))
}
