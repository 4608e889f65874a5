//! Queue payloads and their serialized forms.
//!
//! Delayed messages live in a sorted set as `{"recipientId", "body"}` JSON,
//! optionally extended with `messageId`, `eventId` and `retryCount`. The due
//! time is the sorted-set score and is not part of the payload. Attachment
//! jobs live in a list as `{"recipientId", "payload", "fileName"}` JSON with
//! the payload base64 encoded.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::PayloadError;

/// Serialized body of a delayed message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagePayload {
    pub recipient_id: String,
    pub body: String,
    /// Distinguishes otherwise identical payloads scheduled for the same instant.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<Uuid>,
    /// Business event this message was scheduled for, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub retry_count: u32,
}

fn is_zero(value: &u32) -> bool {
    *value == 0
}

impl MessagePayload {
    /// Build a payload with a fresh message id.
    pub fn new(recipient_id: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            recipient_id: recipient_id.into(),
            body: body.into(),
            message_id: Some(Uuid::new_v4()),
            event_id: None,
            retry_count: 0,
        }
    }

    /// Build a payload without a message id.
    ///
    /// Two anonymous payloads with the same recipient and body scheduled for
    /// the same instant collapse into a single queue entry.
    pub fn anonymous(recipient_id: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            message_id: None,
            ..Self::new(recipient_id, body)
        }
    }

    pub fn with_event_id(mut self, event_id: impl Into<String>) -> Self {
        self.event_id = Some(event_id.into());
        self
    }

    /// The same message with its retry counter advanced by one.
    pub fn next_attempt(&self) -> Self {
        Self {
            retry_count: self.retry_count.saturating_add(1),
            ..self.clone()
        }
    }

    pub fn encode(&self) -> Result<String, PayloadError> {
        serde_json::to_string(self).map_err(PayloadError::Encode)
    }

    pub fn decode(raw: &str) -> Result<Self, PayloadError> {
        serde_json::from_str(raw).map_err(PayloadError::Malformed)
    }
}

/// A message together with the instant it becomes eligible for delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DelayedMessage {
    pub payload: MessagePayload,
    pub due_at_epoch_millis: i64,
    /// Exact queue entry, usable with `DelayedMessageQueue::remove`.
    pub raw: String,
}

impl DelayedMessage {
    pub fn recipient_id(&self) -> &str {
        &self.payload.recipient_id
    }

    pub fn body(&self) -> &str {
        &self.payload.body
    }
}

/// A binary document queued for best-effort delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentJob {
    pub recipient_id: String,
    #[serde(with = "base64_bytes")]
    pub payload: Vec<u8>,
    pub file_name: String,
}

impl AttachmentJob {
    pub fn new(
        recipient_id: impl Into<String>,
        payload: impl Into<Vec<u8>>,
        file_name: impl Into<String>,
    ) -> Self {
        Self {
            recipient_id: recipient_id.into(),
            payload: payload.into(),
            file_name: file_name.into(),
        }
    }

    pub fn encode(&self) -> Result<String, PayloadError> {
        if self.file_name.trim().is_empty() {
            return Err(PayloadError::invalid("fileName", "must not be empty"));
        }
        serde_json::to_string(self).map_err(PayloadError::Encode)
    }

    pub fn decode(raw: &str) -> Result<Self, PayloadError> {
        serde_json::from_str(raw).map_err(PayloadError::Malformed)
    }
}

mod base64_bytes {
    use base64::{Engine as _, engine::general_purpose::STANDARD};
    use serde::{Deserialize, Deserializer, Serializer, de::Error as _};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD.decode(encoded.as_bytes()).map_err(D::Error::custom)
    }
}
