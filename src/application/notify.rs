//! Outbound notification sender consumed by the dispatch poller.

use async_trait::async_trait;
use thiserror::Error;

/// Delivery failure, classified by whether a later attempt could succeed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SendError {
    #[error("transient delivery failure: {0}")]
    Transient(String),
    #[error("permanent delivery failure: {0}")]
    Permanent(String),
}

impl SendError {
    pub fn transient(message: impl Into<String>) -> Self {
        Self::Transient(message.into())
    }

    pub fn permanent(message: impl Into<String>) -> Self {
        Self::Permanent(message.into())
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

#[async_trait]
pub trait NotificationSender: Send + Sync {
    /// Deliver a text message to a recipient.
    async fn send(&self, recipient_id: &str, body: &str) -> Result<(), SendError>;

    /// Deliver a binary document to a recipient.
    async fn send_attachment(
        &self,
        recipient_id: &str,
        payload: &[u8],
        file_name: &str,
    ) -> Result<(), SendError>;
}
