//! Application configuration.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use volume_alerts::{AlertConfig, ConfigError};
use volume_feeds::{BinanceKlineSource, KlineSourceConfig};

/// Application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Alert pipeline configuration.
    pub alerts: AlertConfig,
    /// Market data settings.
    pub feed: FeedSettings,
}

impl AppConfig {
    /// Read the config file. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(e.into()),
        };
        Ok(serde_json::from_str(&raw)?)
    }
}

/// Market data settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedSettings {
    /// REST base URL.
    pub base_url: String,
    /// Quote assets used for symbol discovery, in display order.
    pub quote_assets: Vec<String>,
    /// Candle interval.
    pub interval: String,
    /// Closed candles averaged into the baseline.
    pub baseline_candles: usize,
}

impl Default for FeedSettings {
    fn default() -> Self {
        Self {
            base_url: BinanceKlineSource::BASE_URL.to_string(),
            quote_assets: vec!["USDC".to_string(), "BTC".to_string()],
            interval: "1h".to_string(),
            baseline_candles: 6,
        }
    }
}

impl FeedSettings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.baseline_candles == 0 {
            return Err(ConfigError::Zero("feed.baseline_candles"));
        }
        Ok(())
    }

    pub fn kline_config(&self, timeout: Duration) -> KlineSourceConfig {
        KlineSourceConfig {
            base_url: self.base_url.clone(),
            interval: self.interval.clone(),
            baseline_candles: self.baseline_candles,
            timeout,
        }
    }
}

/// Telegram credentials for alert delivery.
#[derive(Debug, Clone)]
pub struct TelegramSettings {
    pub bot_token: String,
    pub chat_id: String,
}

impl TelegramSettings {
    /// Uses TELEGRAM_BOT_TOKEN and TELEGRAM_CHAT_ID.
    pub fn from_env() -> Option<Self> {
        let bot_token = std::env::var("TELEGRAM_BOT_TOKEN").ok()?;
        let chat_id = std::env::var("TELEGRAM_CHAT_ID").ok()?;

        if bot_token.is_empty() || chat_id.is_empty() {
            return None;
        }

        Some(Self { bot_token, chat_id })
    }
}
