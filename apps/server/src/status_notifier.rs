//! Status notifier for degraded-mode events.
//!
//! Sends Telegram messages through a separate bot so that a broken alert
//! channel can still be reported.

use async_trait::async_trait;
use reqwest::StatusCode;
use std::time::Duration;
use tracing::info;
use volume_alerts::{DeliveryError, NotificationSink};

/// Configuration for status notifications.
#[derive(Debug, Clone)]
pub struct StatusNotifierConfig {
    /// Telegram bot token for status notifications
    pub bot_token: String,
    /// Telegram chat ID to send notifications to
    pub chat_id: String,
}

impl StatusNotifierConfig {
    /// Create config from environment variables.
    /// Uses TELEGRAM_STATUS_BOT_TOKEN and TELEGRAM_STATUS_CHAT_ID.
    pub fn from_env() -> Option<Self> {
        let bot_token = std::env::var("TELEGRAM_STATUS_BOT_TOKEN").ok()?;
        let chat_id = std::env::var("TELEGRAM_STATUS_CHAT_ID").ok()?;

        if bot_token.is_empty() || chat_id.is_empty() {
            return None;
        }

        Some(Self { bot_token, chat_id })
    }
}

/// Status notifier that posts to the Telegram Bot API directly.
pub struct StatusNotifier {
    config: StatusNotifierConfig,
    http_client: reqwest::Client,
    hostname: String,
}

impl StatusNotifier {
    /// Create a new status notifier.
    pub fn new(config: StatusNotifierConfig, timeout: Duration) -> Self {
        let hostname = hostname::get()
            .map(|h| h.to_string_lossy().to_string())
            .unwrap_or_else(|_| "unknown".to_string());

        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            config,
            http_client,
            hostname,
        }
    }

    pub fn chat_id(&self) -> &str {
        &self.config.chat_id
    }
}

/// Prefix a status message with the reporting host.
fn with_hostname(hostname: &str, message: &str) -> String {
    format!("<b>{}</b>\n{}", hostname, message)
}

/// Map a non-success Bot API status to a delivery error.
fn error_for_status(status: StatusCode, body: &str) -> DeliveryError {
    match status {
        StatusCode::TOO_MANY_REQUESTS => DeliveryError::RateLimited,
        StatusCode::BAD_REQUEST | StatusCode::FORBIDDEN | StatusCode::NOT_FOUND => {
            DeliveryError::InvalidTarget(format!("{}: {}", status, body))
        }
        _ => DeliveryError::Network(format!("{}: {}", status, body)),
    }
}

#[async_trait]
impl NotificationSink for StatusNotifier {
    async fn send(&self, message: &str, target: &str) -> Result<(), DeliveryError> {
        let url = format!(
            "https://api.telegram.org/bot{}/sendMessage",
            self.config.bot_token
        );
        let text = with_hostname(&self.hostname, message);

        let params = [
            ("chat_id", target),
            ("text", text.as_str()),
            ("parse_mode", "HTML"),
            ("disable_web_page_preview", "true"),
        ];

        let response = self
            .http_client
            .post(&url)
            .form(&params)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    DeliveryError::Timeout
                } else {
                    DeliveryError::Network(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(error_for_status(status, &body));
        }

        Ok(())
    }
}

/// Build a status notifier from environment variables, if configured.
pub fn try_status_notifier(timeout: Duration) -> Option<StatusNotifier> {
    match StatusNotifierConfig::from_env() {
        Some(config) => {
            let prefix: String = config.chat_id.chars().take(6).collect();
            info!("Status notifier enabled (chat_id: {})", prefix);
            Some(StatusNotifier::new(config, timeout))
        }
        None => {
            info!(
                "Status notifier disabled \
                 (TELEGRAM_STATUS_BOT_TOKEN or TELEGRAM_STATUS_CHAT_ID not set)"
            );
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_with_hostname() {
        assert_eq!(with_hostname("box-1", "degraded"), "<b>box-1</b>\ndegraded");
    }

    #[test]
    fn test_error_for_status() {
        assert_eq!(
            error_for_status(StatusCode::TOO_MANY_REQUESTS, ""),
            DeliveryError::RateLimited
        );
        assert!(matches!(
            error_for_status(StatusCode::BAD_REQUEST, "chat not found"),
            DeliveryError::InvalidTarget(_)
        ));
        assert!(matches!(
            error_for_status(StatusCode::BAD_GATEWAY, ""),
            DeliveryError::Network(_)
        ));
    }

    #[test]
    fn test_notifier_keeps_chat_id() {
        let notifier = StatusNotifier::new(
            StatusNotifierConfig {
                bot_token: "token".to_string(),
                chat_id: "-100".to_string(),
            },
            Duration::from_secs(5),
        );
        assert_eq!(notifier.chat_id(), "-100");
    }
}
