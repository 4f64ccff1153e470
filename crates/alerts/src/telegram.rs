//! Telegram notification sink.

use crate::sink::{DeliveryError, NotificationSink};
use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::{ParseMode, Recipient};
use teloxide::{ApiError, RequestError};
use tracing::debug;

/// Sends alert messages through a Telegram bot.
pub struct TelegramSink {
    bot: Bot,
}

impl TelegramSink {
    /// Create a new sink with the given bot token.
    pub fn new(token: &str) -> Self {
        Self {
            bot: Bot::new(token),
        }
    }
}

/// Parse a routing target: a numeric chat id or an `@channel` username.
pub fn parse_recipient(target: &str) -> Result<Recipient, DeliveryError> {
    let target = target.trim();
    if let Some(name) = target.strip_prefix('@') {
        if name.is_empty() {
            return Err(DeliveryError::InvalidTarget(target.to_string()));
        }
        return Ok(Recipient::ChannelUsername(target.to_string()));
    }
    target
        .parse::<i64>()
        .map(|id| Recipient::Id(ChatId(id)))
        .map_err(|_| DeliveryError::InvalidTarget(target.to_string()))
}

impl From<RequestError> for DeliveryError {
    fn from(err: RequestError) -> Self {
        match err {
            RequestError::RetryAfter(_) => DeliveryError::RateLimited,
            RequestError::MigrateToChatId(_) => {
                DeliveryError::InvalidTarget("chat migrated to a supergroup".to_string())
            }
            RequestError::Api(
                api @ (ApiError::ChatNotFound | ApiError::BotBlocked | ApiError::BotKicked),
            ) => DeliveryError::InvalidTarget(api.to_string()),
            RequestError::Api(api) => DeliveryError::Rejected(api.to_string()),
            other => DeliveryError::Network(other.to_string()),
        }
    }
}

#[async_trait]
impl NotificationSink for TelegramSink {
    async fn send(&self, message: &str, target: &str) -> Result<(), DeliveryError> {
        let recipient = parse_recipient(target)?;
        self.bot
            .send_message(recipient, message)
            .parse_mode(ParseMode::Html)
            .await?;
        debug!(target = %target, "Telegram message delivered");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_recipient_chat_id() {
        assert_eq!(
            parse_recipient("-1001234567890").unwrap(),
            Recipient::Id(ChatId(-1001234567890))
        );
        assert_eq!(parse_recipient(" 42 ").unwrap(), Recipient::Id(ChatId(42)));
    }

    #[test]
    fn test_parse_recipient_channel() {
        assert_eq!(
            parse_recipient("@volume_alerts").unwrap(),
            Recipient::ChannelUsername("@volume_alerts".to_string())
        );
    }

    #[test]
    fn test_parse_recipient_invalid() {
        assert!(matches!(
            parse_recipient("not-a-chat"),
            Err(DeliveryError::InvalidTarget(_))
        ));
        assert!(matches!(parse_recipient("@"), Err(DeliveryError::InvalidTarget(_))));
        assert!(matches!(parse_recipient(""), Err(DeliveryError::InvalidTarget(_))));
    }

    #[test]
    fn test_request_error_mapping() {
        assert_eq!(
            DeliveryError::from(RequestError::Api(ApiError::ChatNotFound)),
            DeliveryError::InvalidTarget(ApiError::ChatNotFound.to_string())
        );
        assert!(matches!(
            DeliveryError::from(RequestError::Api(ApiError::MessageTextIsEmpty)),
            DeliveryError::Rejected(_)
        ));
    }
}
