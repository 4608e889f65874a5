use std::error::Error as StdError;

use thiserror::Error;

use crate::{cache::CacheError, dispatch::DispatchError, infra::error::InfraError};

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error(transparent)]
    Cache(#[from] CacheError),
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl AppError {
    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected(message.into())
    }

    /// The error message followed by each of its sources, outermost first.
    pub fn chain(&self) -> Vec<String> {
        let mut messages = vec![self.to_string()];
        let mut current = self.source();
        while let Some(inner) = current {
            messages.push(inner.to_string());
            current = inner.source();
        }
        messages
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::repos::StoreError;

    #[test]
    fn chain_walks_sources() {
        let err = AppError::from(InfraError::from(StoreError::Connection(
            "refused".to_string(),
        )));
        let chain = err.chain();

        assert_eq!(
            chain,
            vec![
                "durable store error: store connection error: refused".to_string(),
                "store connection error: refused".to_string(),
            ]
        );
    }
}
