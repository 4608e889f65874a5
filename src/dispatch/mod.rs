//! Deferred notification delivery.
//!
//! Producers write to two durable queues:
//! - [`DelayedMessageQueue`]: small text messages ordered by due time,
//!   removed only after a delivery attempt
//! - [`AttachmentJobQueue`]: binary documents in FIFO order, popped before
//!   the delivery attempt and never retried
//!
//! A single [`DispatchPoller`] drains both on a fixed interval.

mod attachments;
mod delayed;
mod error;
mod poller;

pub use attachments::AttachmentJobQueue;
pub use delayed::DelayedMessageQueue;
pub use error::DispatchError;
pub use poller::{AttachmentOutcome, DispatchPoller, PollerConfig, TickReport};

const DEFAULT_DELAYED_MESSAGES_KEY: &str = "delayed-messages";
const DEFAULT_ATTACHMENT_JOBS_KEY: &str = "attachment-jobs";
const DEFAULT_EVENT_INDEX_PREFIX: &str = "event:";

/// Durable store keys shared by producers and the poller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueKeys {
    pub delayed_messages: String,
    pub attachment_jobs: String,
    pub event_index_prefix: String,
}

impl Default for QueueKeys {
    fn default() -> Self {
        Self {
            delayed_messages: DEFAULT_DELAYED_MESSAGES_KEY.to_string(),
            attachment_jobs: DEFAULT_ATTACHMENT_JOBS_KEY.to_string(),
            event_index_prefix: DEFAULT_EVENT_INDEX_PREFIX.to_string(),
        }
    }
}

impl From<&crate::config::StoreSettings> for QueueKeys {
    fn from(settings: &crate::config::StoreSettings) -> Self {
        Self {
            delayed_messages: settings.delayed_messages_key.clone(),
            attachment_jobs: settings.attachment_jobs_key.clone(),
            event_index_prefix: settings.event_index_prefix.clone(),
        }
    }
}
