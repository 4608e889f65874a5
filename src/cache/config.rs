//! Cache region configuration.
//!
//! Every region a write path can name must be declared up front with its
//! consistency policy and entry TTL.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

const DEFAULT_TTL_SECS: u64 = 600;
const DEFAULT_KEY_PREFIX: &str = "cache:";

/// How a region reacts to a committed mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CachePolicy {
    /// Reload the entity and rewrite the entry with a fresh TTL.
    Refresh,
    /// Remove the entry; the next reader repopulates it.
    Evict,
}

impl CachePolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            CachePolicy::Refresh => "refresh",
            CachePolicy::Evict => "evict",
        }
    }
}

impl fmt::Display for CachePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CachePolicy {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "refresh" => Ok(CachePolicy::Refresh),
            "evict" => Ok(CachePolicy::Evict),
            other => Err(format!("unknown cache policy `{other}`")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionConfig {
    pub name: String,
    pub policy: CachePolicy,
    pub ttl: Duration,
}

/// Region table handed to the synchronizer and cache store at construction.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// TTL applied to regions declared without their own.
    pub default_ttl: Duration,
    /// Prefix of every cache entry key in the durable store.
    pub key_prefix: String,
    regions: HashMap<String, RegionConfig>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_ttl: Duration::from_secs(DEFAULT_TTL_SECS),
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
            regions: HashMap::new(),
        }
    }
}

impl From<&crate::config::CacheSettings> for CacheConfig {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        let mut config = Self {
            default_ttl: settings.default_ttl,
            key_prefix: settings.key_prefix.clone(),
            regions: HashMap::new(),
        };
        for region in &settings.regions {
            config = config.with_region_ttl(
                region.name.clone(),
                region.policy,
                region.ttl.unwrap_or(settings.default_ttl),
            );
        }
        config
    }
}

impl CacheConfig {
    /// Declare a region using the default TTL.
    pub fn with_region(self, name: impl Into<String>, policy: CachePolicy) -> Self {
        let ttl = self.default_ttl;
        self.with_region_ttl(name, policy, ttl)
    }

    pub fn with_region_ttl(
        mut self,
        name: impl Into<String>,
        policy: CachePolicy,
        ttl: Duration,
    ) -> Self {
        let name = name.into();
        self.regions
            .insert(name.clone(), RegionConfig { name, policy, ttl });
        self
    }

    pub fn region(&self, name: &str) -> Option<&RegionConfig> {
        self.regions.get(name)
    }

    pub fn regions(&self) -> impl Iterator<Item = &RegionConfig> {
        self.regions.values()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }
}
