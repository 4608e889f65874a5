use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use herald::application::notify::{NotificationSender, SendError};
use herald::dispatch::{
    AttachmentJobQueue, AttachmentOutcome, DelayedMessageQueue, DispatchPoller, PollerConfig,
    QueueKeys,
};
use herald::domain::messages::{AttachmentJob, MessagePayload};
use herald::infra::store::MemoryStore;
use herald::util::now_epoch_millis;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Sent {
    Message { recipient_id: String, body: String },
    Attachment { recipient_id: String, file_name: String, bytes: usize },
}

#[derive(Default)]
struct RecordingSender {
    sent: Mutex<Vec<Sent>>,
    fail_recipients: Vec<String>,
}

impl RecordingSender {
    fn failing_for(recipient_id: &str) -> Self {
        Self {
            fail_recipients: vec![recipient_id.to_string()],
            ..Default::default()
        }
    }

    fn sent(&self) -> Vec<Sent> {
        self.sent.lock().expect("sent lock").clone()
    }

    fn outcome(&self, recipient_id: &str) -> Result<(), SendError> {
        if self.fail_recipients.iter().any(|r| r == recipient_id) {
            Err(SendError::transient("provider unavailable"))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl NotificationSender for RecordingSender {
    async fn send(&self, recipient_id: &str, body: &str) -> Result<(), SendError> {
        self.sent.lock().expect("sent lock").push(Sent::Message {
            recipient_id: recipient_id.to_string(),
            body: body.to_string(),
        });
        self.outcome(recipient_id)
    }

    async fn send_attachment(
        &self,
        recipient_id: &str,
        payload: &[u8],
        file_name: &str,
    ) -> Result<(), SendError> {
        self.sent.lock().expect("sent lock").push(Sent::Attachment {
            recipient_id: recipient_id.to_string(),
            file_name: file_name.to_string(),
            bytes: payload.len(),
        });
        self.outcome(recipient_id)
    }
}

struct Harness {
    delayed: DelayedMessageQueue,
    attachments: AttachmentJobQueue,
    poller: DispatchPoller,
    sender: Arc<RecordingSender>,
}

fn harness(sender: RecordingSender) -> Harness {
    let store = Arc::new(MemoryStore::new());
    let keys = QueueKeys::default();
    let delayed = DelayedMessageQueue::new(store.clone(), &keys);
    let attachments = AttachmentJobQueue::new(store, &keys);
    let sender = Arc::new(sender);
    let poller = DispatchPoller::new(
        delayed.clone(),
        attachments.clone(),
        sender.clone(),
        PollerConfig::default(),
    );
    Harness {
        delayed,
        attachments,
        poller,
        sender,
    }
}

#[tokio::test]
async fn due_message_is_sent_once_and_removed() {
    let h = harness(RecordingSender::default());
    h.delayed
        .enqueue(MessagePayload::anonymous("123", "Pong"), Duration::ZERO)
        .await
        .expect("enqueue");

    let report = h.poller.tick_at(now_epoch_millis() + 1).await;

    assert_eq!(report.sent, 1);
    assert_eq!(
        h.sender.sent(),
        vec![Sent::Message {
            recipient_id: "123".to_string(),
            body: "Pong".to_string(),
        }]
    );
    assert!(h.delayed.is_empty().await.expect("len"));

    let second = h.poller.tick_at(now_epoch_millis() + 1).await;
    assert!(second.is_idle());
    assert_eq!(h.sender.sent().len(), 1);
}

#[tokio::test]
async fn failed_attachment_is_dropped_after_one_tick() {
    let h = harness(RecordingSender::failing_for("77"));
    h.attachments
        .push(&AttachmentJob::new("77", b"%PDF-1.7".to_vec(), "invoice.pdf"))
        .await
        .expect("push");

    let report = h.poller.tick().await;

    assert_eq!(report.attachment, Some(AttachmentOutcome::Failed));
    assert_eq!(h.attachments.len().await.expect("len"), 0);
    assert_eq!(
        h.sender.sent(),
        vec![Sent::Attachment {
            recipient_id: "77".to_string(),
            file_name: "invoice.pdf".to_string(),
            bytes: 8,
        }]
    );

    let next = h.poller.tick().await;
    assert_eq!(next.attachment, None);
}

#[tokio::test]
async fn failed_message_is_removed_without_retry() {
    let h = harness(RecordingSender::failing_for("9"));
    h.delayed
        .enqueue_at(MessagePayload::new("9", "unreachable"), 100)
        .await
        .expect("enqueue");

    let report = h.poller.tick_at(100).await;

    assert_eq!(report.failed, 1);
    assert!(h.delayed.is_empty().await.expect("len"));
}

#[tokio::test]
async fn only_due_messages_are_delivered_in_due_order() {
    let h = harness(RecordingSender::default());
    for due_at in [300, 200, 100] {
        h.delayed
            .enqueue_at(MessagePayload::new("1", format!("due {due_at}")), due_at)
            .await
            .expect("enqueue");
    }

    let report = h.poller.tick_at(250).await;

    assert_eq!(report.sent, 2);
    let bodies: Vec<String> = h
        .sender
        .sent()
        .into_iter()
        .filter_map(|sent| match sent {
            Sent::Message { body, .. } => Some(body),
            Sent::Attachment { .. } => None,
        })
        .collect();
    assert_eq!(bodies, vec!["due 100", "due 200"]);
    assert_eq!(h.delayed.len().await.expect("len"), 1);
}

#[tokio::test]
async fn message_scheduled_in_the_future_waits() {
    let h = harness(RecordingSender::default());
    h.delayed
        .enqueue(MessagePayload::new("1", "later"), Duration::from_secs(3600))
        .await
        .expect("enqueue");

    let report = h.poller.tick().await;

    assert!(report.is_idle());
    assert!(h.sender.sent().is_empty());
    assert_eq!(h.delayed.len().await.expect("len"), 1);
}

#[tokio::test]
async fn cancelled_event_message_is_never_sent() {
    let h = harness(RecordingSender::default());
    h.delayed
        .schedule_for_event("meeting-17", MessagePayload::new("5", "starts soon"), Duration::ZERO)
        .await
        .expect("schedule");

    assert!(h.delayed.cancel_event("meeting-17").await.expect("cancel"));
    let report = h.poller.tick_at(i64::MAX).await;

    assert!(report.is_idle());
    assert!(h.sender.sent().is_empty());
}

#[tokio::test(start_paused = true)]
async fn spawned_poller_ticks_until_shutdown() {
    let h = harness(RecordingSender::default());
    h.delayed
        .enqueue_at(MessagePayload::new("1", "tick"), 0)
        .await
        .expect("enqueue");

    let poller = Arc::new(DispatchPoller::new(
        h.delayed.clone(),
        h.attachments.clone(),
        h.sender.clone(),
        PollerConfig {
            poll_interval: Duration::from_secs(10),
            ..PollerConfig::default()
        },
    ));
    let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
    let handle = poller.spawn(async move {
        let _ = stop_rx.await;
    });

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert!(h.sender.sent().is_empty(), "first tick fires after one interval");

    tokio::time::sleep(Duration::from_secs(6)).await;
    assert_eq!(h.sender.sent().len(), 1);

    stop_tx.send(()).expect("poller still running");
    handle.await.expect("poller task");
}
