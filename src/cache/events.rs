//! Commit-scoped buffering of cache-mutation intents.
//!
//! A [`CommitEventBus`] belongs to exactly one unit of work. Write paths
//! register intents while the transaction is open; the transaction owner then
//! calls [`CommitEventBus::on_commit`] after the durable commit or
//! [`CommitEventBus::on_rollback`] after an abort. Both consume the bus, so
//! the buffer is flushed or discarded at most once.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, info};
use uuid::Uuid;

use super::error::CacheError;
use super::synchronizer::CacheSynchronizer;

/// A request to bring one cache entry in line with a committed write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheMutationIntent {
    pub region: String,
    pub key: String,
}

impl CacheMutationIntent {
    pub fn new(region: impl Into<String>, key: impl fmt::Display) -> Self {
        Self {
            region: region.into(),
            key: key.to_string(),
        }
    }

    /// Zip parallel region and key lists into intents.
    ///
    /// Lists of different lengths are a configuration error.
    pub fn pairs<R, K>(regions: &[R], keys: &[K]) -> Result<Vec<Self>, CacheError>
    where
        R: AsRef<str>,
        K: fmt::Display,
    {
        if regions.len() != keys.len() {
            return Err(CacheError::MismatchedIntents {
                regions: regions.len(),
                keys: keys.len(),
            });
        }
        Ok(regions
            .iter()
            .zip(keys)
            .map(|(region, key)| Self::new(region.as_ref(), key))
            .collect())
    }
}

/// Per-unit-of-work intent buffer.
///
/// Dropping a bus without calling either hook discards its intents, the same
/// as a rollback.
pub struct CommitEventBus {
    id: Uuid,
    intents: Vec<CacheMutationIntent>,
    synchronizer: Arc<CacheSynchronizer>,
    finished: bool,
}

impl CommitEventBus {
    pub fn new(synchronizer: Arc<CacheSynchronizer>) -> Self {
        Self {
            id: Uuid::new_v4(),
            intents: Vec::new(),
            synchronizer,
            finished: false,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Buffer an intent. Nothing touches the cache until commit.
    pub fn register(&mut self, intent: CacheMutationIntent) {
        self.intents.push(intent);
    }

    /// Buffer intents from parallel region and key lists.
    ///
    /// Nothing is buffered when the lists differ in length.
    pub fn register_pairs<R, K>(&mut self, regions: &[R], keys: &[K]) -> Result<(), CacheError>
    where
        R: AsRef<str>,
        K: fmt::Display,
    {
        let intents = CacheMutationIntent::pairs(regions, keys)?;
        self.intents.extend(intents);
        Ok(())
    }

    pub fn pending(&self) -> &[CacheMutationIntent] {
        &self.intents
    }

    /// Publish the buffered intents, in registration order, to the
    /// synchronizer. Call only after the unit of work durably committed.
    ///
    /// Returns the number of intents applied.
    pub async fn on_commit(mut self) -> Result<usize, CacheError> {
        self.finished = true;
        let intents = std::mem::take(&mut self.intents);
        if intents.is_empty() {
            return Ok(0);
        }

        info!(
            unit_of_work = %self.id,
            intent_count = intents.len(),
            "Flushing cache intents after commit"
        );
        self.synchronizer.apply(&intents).await?;
        Ok(intents.len())
    }

    /// Discard the buffered intents without any cache action.
    pub fn on_rollback(mut self) {
        self.finished = true;
        let discarded = std::mem::take(&mut self.intents).len();
        debug!(
            unit_of_work = %self.id,
            discarded,
            "Cache intents discarded after rollback"
        );
    }
}

impl Drop for CommitEventBus {
    fn drop(&mut self) {
        if !self.finished && !self.intents.is_empty() {
            debug!(
                unit_of_work = %self.id,
                discarded = self.intents.len(),
                "Unit of work ended without commit; cache intents discarded"
            );
        }
    }
}
