//! Durable store adapters.

use std::sync::Arc;

use tracing::info;

use crate::application::repos::DurableStore;
use crate::config::{StoreBackend, StoreSettings};

use super::error::InfraError;

mod memory;
#[cfg(feature = "redis")]
mod redis_store;

pub use memory::MemoryStore;
#[cfg(feature = "redis")]
pub use redis_store::RedisStore;

/// Open the durable store selected by `settings`.
pub async fn open(settings: &StoreSettings) -> Result<Arc<dyn DurableStore>, InfraError> {
    match settings.backend {
        StoreBackend::Memory => {
            info!(backend = %settings.backend, "Using in-process durable store");
            Ok(Arc::new(MemoryStore::new()))
        }
        StoreBackend::Redis => open_redis(settings).await,
    }
}

#[cfg(feature = "redis")]
async fn open_redis(settings: &StoreSettings) -> Result<Arc<dyn DurableStore>, InfraError> {
    let url = settings
        .redis_url
        .as_deref()
        .ok_or_else(|| InfraError::configuration("store.redis_url is not set"))?;
    let store = RedisStore::connect(url).await?;
    info!(backend = %settings.backend, "Connected to durable store");
    Ok(Arc::new(store))
}

#[cfg(not(feature = "redis"))]
async fn open_redis(_settings: &StoreSettings) -> Result<Arc<dyn DurableStore>, InfraError> {
    Err(InfraError::configuration(
        "the redis store backend requires building with the `redis` feature",
    ))
}
