//! Collaborator traits describing the stores the dispatch and cache layers consume.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("database timeout")]
    Timeout,
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store connection error: {0}")]
    Connection(String),
    #[error("store command `{command}` failed: {message}")]
    Command {
        command: &'static str,
        message: String,
    },
}

impl StoreError {
    pub fn command(command: &'static str, err: impl std::fmt::Display) -> Self {
        Self::Command {
            command,
            message: err.to_string(),
        }
    }
}

/// Read access to the primary datastore, used to recompute cache projections.
///
/// Implementations return the entity already projected into the shape the
/// cache stores. `Ok(None)` means the entity no longer exists.
#[async_trait]
pub trait EntityRepo: Send + Sync {
    async fn find_by_id(&self, id: &str) -> Result<Option<Value>, RepoError>;
}

/// Durable key-value/queue store shared by request paths and the poller.
///
/// Every operation must be atomic on its own; callers never hold
/// application-level locks across calls. Sorted-set scores are epoch
/// milliseconds.
#[async_trait]
pub trait DurableStore: Send + Sync {
    /// Insert `member` with `score`, updating the score if it already exists.
    /// Returns true when the member is new.
    async fn zadd(&self, key: &str, member: &str, score: i64) -> Result<bool, StoreError>;

    /// Members with `min <= score <= max`, ascending by score.
    async fn zrangebyscore(&self, key: &str, min: i64, max: i64)
    -> Result<Vec<String>, StoreError>;

    async fn zrem(&self, key: &str, member: &str) -> Result<bool, StoreError>;

    async fn zcard(&self, key: &str) -> Result<usize, StoreError>;

    /// Push onto the head of a list, returning the new length.
    async fn lpush(&self, key: &str, value: &str) -> Result<usize, StoreError>;

    /// Pop from the tail of a list.
    async fn rpop(&self, key: &str) -> Result<Option<String>, StoreError>;

    async fn llen(&self, key: &str) -> Result<usize, StoreError>;

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Store a string value, expiring after `ttl` when one is given.
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), StoreError>;

    async fn del(&self, key: &str) -> Result<bool, StoreError>;
}
