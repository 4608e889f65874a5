//! Recurring delivery of queued notifications.
//!
//! Each tick:
//! 1. Pops at most one attachment job and attempts delivery once
//! 2. Reads every delayed message that is due, attempts delivery and removes
//!    the entry (or moves it to a later due time when retries are enabled)
//!
//! Errors are handled per item and never stop the tick. Ticks do not overlap:
//! a tick that finds another one in progress returns immediately.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use metrics::{counter, histogram};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, instrument, warn};

use crate::application::notify::{NotificationSender, SendError};
use crate::domain::messages::MessagePayload;
use crate::util::now_epoch_millis;

use super::attachments::AttachmentJobQueue;
use super::delayed::DelayedMessageQueue;
use super::error::DispatchError;

const METRIC_MESSAGE_SENT: &str = "herald_dispatch_message_sent_total";
const METRIC_MESSAGE_FAILED: &str = "herald_dispatch_message_failed_total";
const METRIC_MESSAGE_RETRIED: &str = "herald_dispatch_message_retried_total";
const METRIC_ATTACHMENT_SENT: &str = "herald_dispatch_attachment_sent_total";
const METRIC_ATTACHMENT_FAILED: &str = "herald_dispatch_attachment_failed_total";
const METRIC_TICK_MS: &str = "herald_dispatch_tick_ms";
const METRIC_TICK_SKIPPED: &str = "herald_dispatch_tick_skipped_total";

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(60);
const DEFAULT_DELIVERY_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_secs(30);
const DEFAULT_MAX_DELIVERY_RETRIES: u32 = 0;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollerConfig {
    pub poll_interval: Duration,
    /// Upper bound on a single send; expiry counts as a transient failure.
    pub delivery_timeout: Duration,
    /// Transient failures re-schedule a message up to this many times.
    /// Zero discards every message after its first attempt.
    pub max_delivery_retries: u32,
    /// Delay before the first retry, doubled on every further attempt.
    pub retry_backoff: Duration,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            delivery_timeout: DEFAULT_DELIVERY_TIMEOUT,
            max_delivery_retries: DEFAULT_MAX_DELIVERY_RETRIES,
            retry_backoff: DEFAULT_RETRY_BACKOFF,
        }
    }
}

impl From<&crate::config::DispatchSettings> for PollerConfig {
    fn from(settings: &crate::config::DispatchSettings) -> Self {
        Self {
            poll_interval: settings.poll_interval,
            delivery_timeout: settings.delivery_timeout,
            max_delivery_retries: settings.max_delivery_retries,
            retry_backoff: settings.retry_backoff,
        }
    }
}

impl PollerConfig {
    /// Delay before attempt `retry_count + 1`.
    fn backoff(&self, retry_count: u32) -> Duration {
        let factor = 2_u32.checked_pow(retry_count).unwrap_or(u32::MAX);
        self.retry_backoff.saturating_mul(factor)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachmentOutcome {
    Delivered,
    Failed,
    Malformed,
}

/// What a single tick did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Another tick was still running; nothing was attempted.
    pub skipped: bool,
    pub attachment: Option<AttachmentOutcome>,
    pub sent: usize,
    pub failed: usize,
    pub retried: usize,
    pub malformed: usize,
    pub store_errors: usize,
}

impl TickReport {
    fn skipped() -> Self {
        Self {
            skipped: true,
            ..Self::default()
        }
    }

    pub fn is_idle(&self) -> bool {
        self.attachment.is_none()
            && self.sent == 0
            && self.failed == 0
            && self.retried == 0
            && self.malformed == 0
            && self.store_errors == 0
    }
}

pub struct DispatchPoller {
    delayed: DelayedMessageQueue,
    attachments: AttachmentJobQueue,
    sender: Arc<dyn NotificationSender>,
    config: PollerConfig,
    running: Mutex<()>,
}

impl DispatchPoller {
    pub fn new(
        delayed: DelayedMessageQueue,
        attachments: AttachmentJobQueue,
        sender: Arc<dyn NotificationSender>,
        config: PollerConfig,
    ) -> Self {
        Self {
            delayed,
            attachments,
            sender,
            config,
            running: Mutex::new(()),
        }
    }

    pub fn config(&self) -> &PollerConfig {
        &self.config
    }

    pub async fn tick(&self) -> TickReport {
        self.tick_at(now_epoch_millis()).await
    }

    /// Run one tick treating `now_epoch_millis` as the current time.
    #[instrument(skip(self))]
    pub async fn tick_at(&self, now_epoch_millis: i64) -> TickReport {
        let Ok(_guard) = self.running.try_lock() else {
            warn!("Previous dispatch tick still running; skipping");
            counter!(METRIC_TICK_SKIPPED).increment(1);
            return TickReport::skipped();
        };

        let started_at = Instant::now();
        let mut report = TickReport::default();

        self.dispatch_attachment(&mut report).await;
        self.dispatch_due_messages(now_epoch_millis, &mut report).await;

        histogram!(METRIC_TICK_MS).record(started_at.elapsed().as_secs_f64() * 1000.0);
        if report.is_idle() {
            debug!("Dispatch tick found no work");
        } else {
            info!(
                attachment = ?report.attachment,
                sent = report.sent,
                failed = report.failed,
                retried = report.retried,
                malformed = report.malformed,
                store_errors = report.store_errors,
                "Dispatch tick finished"
            );
        }
        report
    }

    async fn dispatch_attachment(&self, report: &mut TickReport) {
        let job = match self.attachments.pop_oldest().await {
            Ok(Some(job)) => job,
            Ok(None) => return,
            Err(DispatchError::Payload(err)) => {
                warn!(error = %err, "Discarding malformed attachment job");
                counter!(METRIC_ATTACHMENT_FAILED, "reason" => "malformed").increment(1);
                report.attachment = Some(AttachmentOutcome::Malformed);
                return;
            }
            Err(err) => {
                error!(error = %err, "Failed to pop attachment job");
                report.store_errors += 1;
                return;
            }
        };

        let delivery = self
            .with_timeout(
                self.sender
                    .send_attachment(&job.recipient_id, &job.payload, &job.file_name),
            )
            .await;

        match delivery {
            Ok(()) => {
                info!(
                    recipient_id = %job.recipient_id,
                    file_name = %job.file_name,
                    bytes = job.payload.len(),
                    "Attachment delivered"
                );
                counter!(METRIC_ATTACHMENT_SENT).increment(1);
                report.attachment = Some(AttachmentOutcome::Delivered);
            }
            Err(err) => {
                warn!(
                    recipient_id = %job.recipient_id,
                    file_name = %job.file_name,
                    error = %err,
                    "Attachment delivery failed; job dropped"
                );
                counter!(METRIC_ATTACHMENT_FAILED, "reason" => failure_reason(&err)).increment(1);
                report.attachment = Some(AttachmentOutcome::Failed);
            }
        }
    }

    async fn dispatch_due_messages(&self, now_epoch_millis: i64, report: &mut TickReport) {
        let entries = match self.delayed.drain_due(now_epoch_millis).await {
            Ok(entries) => entries,
            Err(err) => {
                error!(error = %err, "Failed to read due messages");
                report.store_errors += 1;
                return;
            }
        };

        for raw in entries {
            let payload = match MessagePayload::decode(&raw) {
                Ok(payload) => payload,
                Err(err) => {
                    warn!(error = %err, "Discarding malformed delayed message");
                    counter!(METRIC_MESSAGE_FAILED, "reason" => "malformed").increment(1);
                    report.malformed += 1;
                    self.discard(&raw, None, report).await;
                    continue;
                }
            };

            let delivery = self
                .with_timeout(self.sender.send(&payload.recipient_id, &payload.body))
                .await;

            match delivery {
                Ok(()) => {
                    debug!(recipient_id = %payload.recipient_id, "Delayed message delivered");
                    counter!(METRIC_MESSAGE_SENT).increment(1);
                    report.sent += 1;
                    self.discard(&raw, payload.event_id.as_deref(), report).await;
                }
                Err(err)
                    if err.is_transient()
                        && payload.retry_count < self.config.max_delivery_retries =>
                {
                    self.retry(&raw, &payload, now_epoch_millis, &err, report)
                        .await;
                }
                Err(err) => {
                    warn!(
                        recipient_id = %payload.recipient_id,
                        retry_count = payload.retry_count,
                        error = %err,
                        "Delayed message delivery failed; message dropped"
                    );
                    counter!(METRIC_MESSAGE_FAILED, "reason" => failure_reason(&err)).increment(1);
                    report.failed += 1;
                    self.discard(&raw, payload.event_id.as_deref(), report).await;
                }
            }
        }
    }

    async fn retry(
        &self,
        raw: &str,
        payload: &MessagePayload,
        now_epoch_millis: i64,
        err: &SendError,
        report: &mut TickReport,
    ) {
        let backoff = self.config.backoff(payload.retry_count);
        let backoff_millis = i64::try_from(backoff.as_millis()).unwrap_or(i64::MAX);
        let due_at = now_epoch_millis.saturating_add(backoff_millis);

        match self.delayed.requeue(raw, payload.next_attempt(), due_at).await {
            Ok(_) => {
                info!(
                    recipient_id = %payload.recipient_id,
                    attempt = payload.retry_count + 1,
                    backoff_secs = backoff.as_secs(),
                    error = %err,
                    "Delayed message delivery failed; retry scheduled"
                );
                counter!(METRIC_MESSAGE_RETRIED).increment(1);
                report.retried += 1;
            }
            Err(requeue_err) => {
                error!(
                    recipient_id = %payload.recipient_id,
                    error = %requeue_err,
                    "Failed to reschedule delayed message"
                );
                report.store_errors += 1;
            }
        }
    }

    async fn discard(&self, raw: &str, event_id: Option<&str>, report: &mut TickReport) {
        if let Err(err) = self.delayed.remove(raw).await {
            error!(error = %err, "Failed to remove delayed message");
            report.store_errors += 1;
            return;
        }
        if let Some(event_id) = event_id
            && let Err(err) = self.delayed.forget_event(event_id, raw).await
        {
            warn!(event_id, error = %err, "Failed to clear event index");
            report.store_errors += 1;
        }
    }

    async fn with_timeout<F>(&self, delivery: F) -> Result<(), SendError>
    where
        F: Future<Output = Result<(), SendError>>,
    {
        match tokio::time::timeout(self.config.delivery_timeout, delivery).await {
            Ok(result) => result,
            Err(_) => Err(SendError::transient(format!(
                "delivery timed out after {}ms",
                self.config.delivery_timeout.as_millis()
            ))),
        }
    }

    /// Tick on the configured interval until `shutdown` resolves.
    ///
    /// Shutdown is observed between ticks only; a started tick completes.
    pub async fn run<S>(self: Arc<Self>, shutdown: S)
    where
        S: Future<Output = ()>,
    {
        let mut interval = tokio::time::interval(self.config.poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        interval.tick().await; // Skip the first immediate tick
        tokio::pin!(shutdown);

        info!(
            poll_interval_secs = self.config.poll_interval.as_secs(),
            "Dispatch poller started"
        );
        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                _ = interval.tick() => {
                    self.tick().await;
                }
            }
        }
        info!("Dispatch poller stopped");
    }

    pub fn spawn<S>(self: Arc<Self>, shutdown: S) -> JoinHandle<()>
    where
        S: Future<Output = ()> + Send + 'static,
    {
        tokio::spawn(self.run(shutdown))
    }
}

fn failure_reason(err: &SendError) -> &'static str {
    if err.is_transient() {
        "transient"
    } else {
        "permanent"
    }
}
