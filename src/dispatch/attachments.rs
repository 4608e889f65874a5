//! FIFO queue of binary delivery jobs.

use std::sync::Arc;

use tracing::debug;

use crate::application::repos::DurableStore;
use crate::domain::messages::AttachmentJob;

use super::QueueKeys;
use super::error::DispatchError;

/// Jobs are pushed on the left and popped from the right of a list.
///
/// Popping removes the job from the store before any delivery attempt, so
/// a failed delivery loses it.
#[derive(Clone)]
pub struct AttachmentJobQueue {
    store: Arc<dyn DurableStore>,
    key: String,
}

impl AttachmentJobQueue {
    pub fn new(store: Arc<dyn DurableStore>, keys: &QueueKeys) -> Self {
        Self {
            store,
            key: keys.attachment_jobs.clone(),
        }
    }

    /// Append a job; returns the queue length after the push.
    pub async fn push(&self, job: &AttachmentJob) -> Result<usize, DispatchError> {
        let raw = job.encode()?;
        let len = self.store.lpush(&self.key, &raw).await?;
        debug!(
            recipient_id = %job.recipient_id,
            file_name = %job.file_name,
            queue_len = len,
            "Attachment job queued"
        );
        Ok(len)
    }

    /// Pop the oldest job without blocking.
    ///
    /// An undecodable entry is still removed and reported as a payload error.
    pub async fn pop_oldest(&self) -> Result<Option<AttachmentJob>, DispatchError> {
        let Some(raw) = self.store.rpop(&self.key).await? else {
            return Ok(None);
        };
        Ok(Some(AttachmentJob::decode(&raw)?))
    }

    pub async fn len(&self) -> Result<usize, DispatchError> {
        Ok(self.store.llen(&self.key).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::store::MemoryStore;

    fn queue() -> (AttachmentJobQueue, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        (
            AttachmentJobQueue::new(store.clone(), &QueueKeys::default()),
            store,
        )
    }

    #[tokio::test]
    async fn pops_in_push_order() {
        let (queue, _) = queue();
        queue
            .push(&AttachmentJob::new("1", b"first".to_vec(), "a.pdf"))
            .await
            .expect("push");
        queue
            .push(&AttachmentJob::new("2", b"second".to_vec(), "b.pdf"))
            .await
            .expect("push");

        let first = queue.pop_oldest().await.expect("pop").expect("job");
        let second = queue.pop_oldest().await.expect("pop").expect("job");

        assert_eq!(first.file_name, "a.pdf");
        assert_eq!(second.payload, b"second");
        assert!(queue.pop_oldest().await.expect("pop").is_none());
    }

    #[tokio::test]
    async fn malformed_entry_is_consumed() {
        let (queue, store) = queue();
        store.lpush("attachment-jobs", "{oops").await.expect("lpush");

        let err = queue.pop_oldest().await.expect_err("should fail");
        assert!(matches!(err, DispatchError::Payload(_)));
        assert_eq!(queue.len().await.expect("len"), 0);
    }

    #[tokio::test]
    async fn job_without_file_name_is_rejected_before_queueing() {
        let (queue, _) = queue();
        let err = queue
            .push(&AttachmentJob::new("1", b"x".to_vec(), ""))
            .await
            .expect_err("should fail");

        assert!(matches!(err, DispatchError::Payload(_)));
        assert_eq!(queue.len().await.expect("len"), 0);
    }
}
