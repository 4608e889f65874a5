use thiserror::Error;

use crate::application::repos::{RepoError, StoreError};

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache region `{0}` is not configured")]
    UnknownRegion(String),
    #[error("cache region `{0}` uses the refresh policy but has no entity loader")]
    MissingLoader(String),
    #[error("mismatched cache intents: {regions} regions for {keys} keys")]
    MismatchedIntents { regions: usize, keys: usize },
    #[error("entity lookup failed during cache refresh: {0}")]
    Repo(#[from] RepoError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("cache entry could not be serialized: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl CacheError {
    /// Configuration errors are programming bugs and must never be retried.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            CacheError::UnknownRegion(_)
                | CacheError::MissingLoader(_)
                | CacheError::MismatchedIntents { .. }
        )
    }
}
