//! Read-side cache access.
//!
//! Entries are JSON projections stored as strings in the durable store under
//! `<prefix><region>:<key>`, each written with its region's TTL. Null or
//! empty projections are never written, so absent entities are looked up
//! again on the next read instead of being cached as negative results.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use metrics::counter;
use serde_json::Value;
use tracing::debug;

use crate::application::repos::{DurableStore, RepoError};

use super::config::{CacheConfig, RegionConfig};
use super::error::CacheError;
use super::keys::CacheKey;

const METRIC_CACHE_HIT: &str = "herald_cache_hit_total";
const METRIC_CACHE_MISS: &str = "herald_cache_miss_total";

pub struct CacheStore {
    config: Arc<CacheConfig>,
    store: Arc<dyn DurableStore>,
}

impl CacheStore {
    pub fn new(config: Arc<CacheConfig>, store: Arc<dyn DurableStore>) -> Self {
        Self { config, store }
    }

    pub fn config(&self) -> &Arc<CacheConfig> {
        &self.config
    }

    fn region(&self, name: &str) -> Result<&RegionConfig, CacheError> {
        self.config
            .region(name)
            .ok_or_else(|| CacheError::UnknownRegion(name.to_string()))
    }

    /// Cached projection for `key` in `region`, if present and unexpired.
    pub async fn get(
        &self,
        region: &str,
        key: impl fmt::Display,
    ) -> Result<Option<Value>, CacheError> {
        self.region(region)?;
        let cache_key = CacheKey::new(region, key);
        let raw = self
            .store
            .get(&cache_key.storage_key(&self.config.key_prefix))
            .await?;

        match raw {
            Some(raw) => {
                counter!(METRIC_CACHE_HIT, "region" => region.to_string()).increment(1);
                Ok(Some(serde_json::from_str(&raw)?))
            }
            None => {
                counter!(METRIC_CACHE_MISS, "region" => region.to_string()).increment(1);
                Ok(None)
            }
        }
    }

    /// Write a projection with the region TTL.
    ///
    /// Returns false without touching the store when the value is not
    /// cacheable.
    pub async fn put(
        &self,
        region: &str,
        key: impl fmt::Display,
        value: &Value,
    ) -> Result<bool, CacheError> {
        let ttl = self.region(region)?.ttl;
        if !is_cacheable(value) {
            return Ok(false);
        }

        let cache_key = CacheKey::new(region, key);
        let raw = serde_json::to_string(value)?;
        self.store
            .set(
                &cache_key.storage_key(&self.config.key_prefix),
                &raw,
                Some(ttl),
            )
            .await?;
        debug!(cache_key = %cache_key, ttl_secs = ttl.as_secs(), "Cache entry written");
        Ok(true)
    }

    pub async fn evict(&self, region: &str, key: impl fmt::Display) -> Result<bool, CacheError> {
        self.region(region)?;
        let cache_key = CacheKey::new(region, key);
        let removed = self
            .store
            .del(&cache_key.storage_key(&self.config.key_prefix))
            .await?;
        debug!(cache_key = %cache_key, removed, "Cache entry evicted");
        Ok(removed)
    }

    /// Read-through access: return the cached projection or load, cache and
    /// return it. A loader result of `None` or null is returned uncached.
    pub async fn get_or_load<F, Fut>(
        &self,
        region: &str,
        key: impl fmt::Display,
        loader: F,
    ) -> Result<Option<Value>, CacheError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Option<Value>, RepoError>>,
    {
        let key = key.to_string();
        if let Some(cached) = self.get(region, &key).await? {
            return Ok(Some(cached));
        }

        let loaded = loader().await?;
        match loaded {
            Some(value) if is_cacheable(&value) => {
                self.put(region, &key, &value).await?;
                Ok(Some(value))
            }
            _ => Ok(None),
        }
    }
}

pub(crate) fn is_cacheable(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(text) => !text.is_empty(),
        _ => true,
    }
}
