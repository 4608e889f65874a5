//! Entry point for write paths.
//!
//! Opens commit-scoped intent buses and applies intents for writes that are
//! already durable.

use std::sync::Arc;

use tracing::debug;

use super::error::CacheError;
use super::events::{CacheMutationIntent, CommitEventBus};
use super::synchronizer::CacheSynchronizer;

/// Hands out one [`CommitEventBus`] per unit of work.
///
/// # Usage
///
/// ```ignore
/// let mut bus = trigger.begin();
/// bus.register(CacheMutationIntent::new("child", child_id));
/// tx.commit().await?;
/// bus.on_commit().await?;
/// ```
#[derive(Clone)]
pub struct CacheTrigger {
    synchronizer: Arc<CacheSynchronizer>,
}

impl CacheTrigger {
    pub fn new(synchronizer: Arc<CacheSynchronizer>) -> Self {
        Self { synchronizer }
    }

    /// Open an intent buffer for a new unit of work.
    pub fn begin(&self) -> CommitEventBus {
        let bus = CommitEventBus::new(self.synchronizer.clone());
        debug!(unit_of_work = %bus.id(), "Cache intent bus opened");
        bus
    }

    /// Apply intents for a write that has already committed outside any bus.
    pub async fn commit_now(&self, intents: &[CacheMutationIntent]) -> Result<(), CacheError> {
        self.synchronizer.apply(intents).await
    }

    pub fn synchronizer(&self) -> &Arc<CacheSynchronizer> {
        &self.synchronizer
    }
}
