//! Applies committed cache-mutation intents.
//!
//! Each intent is resolved against the region table and handled by the
//! region's policy:
//! 1. Refresh: reload the entity through the region's loader and rewrite the
//!    entry with a fresh TTL (a vanished entity evicts the entry)
//! 2. Evict: delete the entry so the next reader repopulates it

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use metrics::{counter, histogram};
use tracing::{debug, info, instrument};

use crate::application::repos::{DurableStore, EntityRepo};

use super::config::{CacheConfig, CachePolicy};
use super::error::CacheError;
use super::events::CacheMutationIntent;
use super::store::{CacheStore, is_cacheable};

const METRIC_CACHE_APPLY_MS: &str = "herald_cache_apply_ms";
const METRIC_CACHE_REFRESH: &str = "herald_cache_refresh_total";
const METRIC_CACHE_EVICT: &str = "herald_cache_evict_total";

pub struct CacheSynchronizer {
    config: Arc<CacheConfig>,
    cache: Arc<CacheStore>,
    loaders: HashMap<String, Arc<dyn EntityRepo>>,
}

/// Collects entity loaders for refresh regions before building a synchronizer.
pub struct CacheSynchronizerBuilder {
    config: CacheConfig,
    store: Arc<dyn DurableStore>,
    loaders: HashMap<String, Arc<dyn EntityRepo>>,
}

impl CacheSynchronizerBuilder {
    /// Attach the loader used to recompute entries of `region`.
    pub fn loader(mut self, region: impl Into<String>, repo: Arc<dyn EntityRepo>) -> Self {
        self.loaders.insert(region.into(), repo);
        self
    }

    /// Validate the region table against the attached loaders.
    ///
    /// Every refresh region needs a loader and every loader must belong to a
    /// declared region.
    pub fn build(self) -> Result<CacheSynchronizer, CacheError> {
        for region in self.config.regions() {
            if region.policy == CachePolicy::Refresh && !self.loaders.contains_key(&region.name) {
                return Err(CacheError::MissingLoader(region.name.clone()));
            }
        }
        if let Some(orphan) = self
            .loaders
            .keys()
            .find(|name| self.config.region(name).is_none())
        {
            return Err(CacheError::UnknownRegion(orphan.clone()));
        }

        let config = Arc::new(self.config);
        let cache = Arc::new(CacheStore::new(config.clone(), self.store));
        Ok(CacheSynchronizer {
            config,
            cache,
            loaders: self.loaders,
        })
    }
}

impl CacheSynchronizer {
    pub fn builder(config: CacheConfig, store: Arc<dyn DurableStore>) -> CacheSynchronizerBuilder {
        CacheSynchronizerBuilder {
            config,
            store,
            loaders: HashMap::new(),
        }
    }

    /// Apply intents in the order given.
    ///
    /// Every intent's region is checked before any cache state changes, so
    /// a misconfigured batch has no partial effect. Loader and store errors
    /// stop the batch and are returned to the committer.
    #[instrument(skip(self, intents), fields(intent_count = intents.len()))]
    pub async fn apply(&self, intents: &[CacheMutationIntent]) -> Result<(), CacheError> {
        if intents.is_empty() {
            return Ok(());
        }
        let started_at = Instant::now();

        for intent in intents {
            if self.config.region(&intent.region).is_none() {
                return Err(CacheError::UnknownRegion(intent.region.clone()));
            }
        }

        let mut refreshed = 0_usize;
        let mut evicted = 0_usize;
        for intent in intents {
            let policy = self
                .config
                .region(&intent.region)
                .map(|region| region.policy)
                .ok_or_else(|| CacheError::UnknownRegion(intent.region.clone()))?;

            match policy {
                CachePolicy::Refresh => {
                    self.refresh(intent).await?;
                    refreshed += 1;
                }
                CachePolicy::Evict => {
                    self.cache.evict(&intent.region, &intent.key).await?;
                    counter!(METRIC_CACHE_EVICT, "region" => intent.region.clone()).increment(1);
                    evicted += 1;
                }
            }
        }

        info!(refreshed, evicted, "Cache intents applied");
        histogram!(METRIC_CACHE_APPLY_MS).record(started_at.elapsed().as_secs_f64() * 1000.0);
        Ok(())
    }

    async fn refresh(&self, intent: &CacheMutationIntent) -> Result<(), CacheError> {
        let loader = self
            .loaders
            .get(&intent.region)
            .ok_or_else(|| CacheError::MissingLoader(intent.region.clone()))?;

        match loader.find_by_id(&intent.key).await? {
            Some(value) if is_cacheable(&value) => {
                self.cache.put(&intent.region, &intent.key, &value).await?;
                debug!(region = %intent.region, key = %intent.key, "Refreshed cache entry");
            }
            _ => {
                self.cache.evict(&intent.region, &intent.key).await?;
                debug!(
                    region = %intent.region,
                    key = %intent.key,
                    "Entity gone during refresh; entry evicted"
                );
            }
        }
        counter!(METRIC_CACHE_REFRESH, "region" => intent.region.clone()).increment(1);
        Ok(())
    }

    /// Read-side access to the cache this synchronizer maintains.
    pub fn cache(&self) -> &Arc<CacheStore> {
        &self.cache
    }

    pub fn config(&self) -> &Arc<CacheConfig> {
        &self.config
    }
}
