//! Time-ordered queue of pending notification messages.
//!
//! Entries are serialized [`MessagePayload`]s in a sorted set scored by their
//! due time in epoch milliseconds. Messages scheduled for a business event are
//! also indexed under `<event_index_prefix><event id>` so they can be
//! cancelled before they fire.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use crate::application::repos::DurableStore;
use crate::domain::messages::{DelayedMessage, MessagePayload};
use crate::util::now_epoch_millis;

use super::QueueKeys;
use super::error::DispatchError;

#[derive(Clone)]
pub struct DelayedMessageQueue {
    store: Arc<dyn DurableStore>,
    key: String,
    event_index_prefix: String,
}

impl DelayedMessageQueue {
    pub fn new(store: Arc<dyn DurableStore>, keys: &QueueKeys) -> Self {
        Self {
            store,
            key: keys.delayed_messages.clone(),
            event_index_prefix: keys.event_index_prefix.clone(),
        }
    }

    /// Schedule `payload` for `now + delay`.
    pub async fn enqueue(
        &self,
        payload: MessagePayload,
        delay: Duration,
    ) -> Result<DelayedMessage, DispatchError> {
        let delay_millis = i64::try_from(delay.as_millis()).unwrap_or(i64::MAX);
        self.enqueue_at(payload, now_epoch_millis().saturating_add(delay_millis))
            .await
    }

    /// Schedule `payload` for an absolute due time.
    ///
    /// Re-adding an identical entry moves it to the new due time instead of
    /// creating a second one.
    pub async fn enqueue_at(
        &self,
        payload: MessagePayload,
        due_at_epoch_millis: i64,
    ) -> Result<DelayedMessage, DispatchError> {
        let raw = payload.encode()?;
        let inserted = self.store.zadd(&self.key, &raw, due_at_epoch_millis).await?;
        if inserted {
            debug!(
                recipient_id = %payload.recipient_id,
                due_at = due_at_epoch_millis,
                "Delayed message enqueued"
            );
        } else {
            debug!(
                recipient_id = %payload.recipient_id,
                due_at = due_at_epoch_millis,
                "Identical delayed message already queued; due time replaced"
            );
        }

        Ok(DelayedMessage {
            payload,
            due_at_epoch_millis,
            raw,
        })
    }

    /// Raw entries whose due time is at or before `now_epoch_millis`.
    ///
    /// Read only; entries stay queued until [`remove`](Self::remove).
    pub async fn drain_due(&self, now_epoch_millis: i64) -> Result<Vec<String>, DispatchError> {
        Ok(self
            .store
            .zrangebyscore(&self.key, i64::MIN, now_epoch_millis)
            .await?)
    }

    pub async fn remove(&self, raw: &str) -> Result<bool, DispatchError> {
        Ok(self.store.zrem(&self.key, raw).await?)
    }

    pub async fn len(&self) -> Result<usize, DispatchError> {
        Ok(self.store.zcard(&self.key).await?)
    }

    pub async fn is_empty(&self) -> Result<bool, DispatchError> {
        Ok(self.len().await? == 0)
    }

    /// Schedule a message tied to a business event.
    ///
    /// A message already scheduled for the same event is replaced.
    pub async fn schedule_for_event(
        &self,
        event_id: &str,
        payload: MessagePayload,
        delay: Duration,
    ) -> Result<DelayedMessage, DispatchError> {
        let index_key = self.event_key(event_id);
        if let Some(previous) = self.store.get(&index_key).await? {
            self.store.zrem(&self.key, &previous).await?;
            debug!(event_id, "Replacing message scheduled for event");
        }

        let message = self
            .enqueue(payload.with_event_id(event_id), delay)
            .await?;
        self.store.set(&index_key, &message.raw, None).await?;
        Ok(message)
    }

    /// Cancel the message scheduled for `event_id`.
    ///
    /// Returns false when nothing is scheduled for the event.
    pub async fn cancel_event(&self, event_id: &str) -> Result<bool, DispatchError> {
        let index_key = self.event_key(event_id);
        let Some(raw) = self.store.get(&index_key).await? else {
            info!(event_id, "No scheduled message to cancel for event");
            return Ok(false);
        };

        let removed = self.store.zrem(&self.key, &raw).await?;
        self.store.del(&index_key).await?;
        info!(event_id, removed, "Scheduled message cancelled for event");
        Ok(true)
    }

    /// Drop the event index entry if it still points at `raw`.
    pub(crate) async fn forget_event(&self, event_id: &str, raw: &str) -> Result<(), DispatchError> {
        let index_key = self.event_key(event_id);
        if self.store.get(&index_key).await?.as_deref() == Some(raw) {
            self.store.del(&index_key).await?;
        }
        Ok(())
    }

    /// Replace `raw` with `payload` due at `due_at_epoch_millis`.
    ///
    /// The new entry is written before the old one is removed, so the message
    /// is never absent from the queue.
    pub(crate) async fn requeue(
        &self,
        raw: &str,
        payload: MessagePayload,
        due_at_epoch_millis: i64,
    ) -> Result<DelayedMessage, DispatchError> {
        let message = self.enqueue_at(payload, due_at_epoch_millis).await?;
        self.store.zrem(&self.key, raw).await?;

        if let Some(event_id) = message.payload.event_id.as_deref() {
            let index_key = self.event_key(event_id);
            if self.store.get(&index_key).await?.as_deref() == Some(raw) {
                self.store.set(&index_key, &message.raw, None).await?;
            }
        }
        Ok(message)
    }

    fn event_key(&self, event_id: &str) -> String {
        format!("{}{event_id}", self.event_index_prefix)
    }
}
