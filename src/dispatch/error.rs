use thiserror::Error;

use crate::application::repos::StoreError;
use crate::domain::error::PayloadError;

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Payload(#[from] PayloadError),
}
