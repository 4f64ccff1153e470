//! Notification delivery abstraction.

use async_trait::async_trait;
use thiserror::Error;

/// Errors that can occur while delivering a notification.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeliveryError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Rate limit exceeded")]
    RateLimited,

    #[error("Invalid target: {0}")]
    InvalidTarget(String),

    #[error("Message rejected: {0}")]
    Rejected(String),

    #[error("Delivery timed out")]
    Timeout,
}

impl DeliveryError {
    /// Returns true if the next cycle is likely to succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            DeliveryError::Network(_) | DeliveryError::RateLimited | DeliveryError::Timeout
        )
    }
}

/// Delivers a rendered message to a routing target (e.g. a chat id).
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn send(&self, message: &str, target: &str) -> Result<(), DeliveryError>;
}
