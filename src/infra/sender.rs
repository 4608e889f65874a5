//! Notification sender that records deliveries in the log.
//!
//! Stands in for a provider client when the dispatcher runs without one.

use async_trait::async_trait;
use tracing::info;

use crate::application::notify::{NotificationSender, SendError};

#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingSender;

#[async_trait]
impl NotificationSender for LoggingSender {
    async fn send(&self, recipient_id: &str, body: &str) -> Result<(), SendError> {
        if recipient_id.trim().is_empty() {
            return Err(SendError::permanent("recipient id is empty"));
        }
        info!(recipient_id, body_len = body.len(), "Message delivered");
        Ok(())
    }

    async fn send_attachment(
        &self,
        recipient_id: &str,
        payload: &[u8],
        file_name: &str,
    ) -> Result<(), SendError> {
        if recipient_id.trim().is_empty() {
            return Err(SendError::permanent("recipient id is empty"));
        }
        info!(
            recipient_id,
            file_name,
            bytes = payload.len(),
            "Attachment delivered"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn empty_recipient_is_a_permanent_failure() {
        let err = LoggingSender
            .send(" ", "hello")
            .await
            .expect_err("should fail");
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn delivers_attachments() {
        LoggingSender
            .send_attachment("77", b"%PDF-1.7", "report.pdf")
            .await
            .expect("delivered");
    }
}
