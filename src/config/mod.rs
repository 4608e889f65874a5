//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::{collections::HashSet, fmt, str::FromStr, time::Duration};

use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

use crate::cache::{CacheConfig, CachePolicy};
use crate::dispatch::{PollerConfig, QueueKeys};

mod cli;

pub use cli::{CliArgs, Command, ServeArgs, ServeOverrides};

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "herald";
const ENV_PREFIX: &str = "HERALD";

/// Fully-resolved deployment settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub logging: LoggingSettings,
    pub dispatch: DispatchSettings,
    pub store: StoreSettings,
    pub cache: CacheSettings,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct DispatchSettings {
    pub poll_interval: Duration,
    pub delivery_timeout: Duration,
    pub max_delivery_retries: u32,
    pub retry_backoff: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Memory,
    Redis,
}

impl fmt::Display for StoreBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreBackend::Memory => f.write_str("memory"),
            StoreBackend::Redis => f.write_str("redis"),
        }
    }
}

impl FromStr for StoreBackend {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(StoreBackend::Memory),
            "redis" => Ok(StoreBackend::Redis),
            other => Err(format!("unknown store backend `{other}`")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct StoreSettings {
    pub backend: StoreBackend,
    pub redis_url: Option<String>,
    pub delayed_messages_key: String,
    pub attachment_jobs_key: String,
    pub event_index_prefix: String,
}

#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub default_ttl: Duration,
    pub key_prefix: String,
    pub regions: Vec<RegionSettings>,
}

#[derive(Debug, Clone)]
pub struct RegionSettings {
    pub name: String,
    pub policy: CachePolicy,
    /// Falls back to `CacheSettings::default_ttl` when unset.
    pub ttl: Option<Duration>,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix(ENV_PREFIX).separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    match cli.command.as_ref() {
        Some(Command::Serve(args)) => raw.apply_serve_overrides(&args.overrides),
        None => raw.apply_serve_overrides(&ServeOverrides::default()),
    }

    Settings::from_raw(raw)
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    logging: RawLoggingSettings,
    dispatch: RawDispatchSettings,
    store: RawStoreSettings,
    cache: RawCacheSettings,
}

impl RawSettings {
    fn apply_serve_overrides(&mut self, overrides: &ServeOverrides) {
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(seconds) = overrides.dispatch_poll_interval_seconds {
            self.dispatch.poll_interval_seconds = Some(seconds);
        }
        if let Some(seconds) = overrides.dispatch_delivery_timeout_seconds {
            self.dispatch.delivery_timeout_seconds = Some(seconds);
        }
        if let Some(retries) = overrides.dispatch_max_delivery_retries {
            self.dispatch.max_delivery_retries = Some(retries);
        }
        if let Some(backend) = overrides.store_backend.as_ref() {
            self.store.backend = Some(backend.clone());
        }
        if let Some(url) = overrides.redis_url.as_ref() {
            self.store.redis_url = Some(url.clone());
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            logging,
            dispatch,
            store,
            cache,
        } = raw;

        let logging = build_logging_settings(logging)?;
        let dispatch = build_dispatch_settings(dispatch)?;
        let cache_prefix = store.cache_prefix.clone();
        let store = build_store_settings(store)?;
        let cache = build_cache_settings(cache, cache_prefix)?;

        Ok(Self {
            logging,
            dispatch,
            store,
            cache,
        })
    }
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_dispatch_settings(dispatch: RawDispatchSettings) -> Result<DispatchSettings, LoadError> {
    let defaults = PollerConfig::default();
    let poll_interval = positive_seconds(
        dispatch
            .poll_interval_seconds
            .unwrap_or(defaults.poll_interval.as_secs()),
        "dispatch.poll_interval_seconds",
    )?;
    let delivery_timeout = positive_seconds(
        dispatch
            .delivery_timeout_seconds
            .unwrap_or(defaults.delivery_timeout.as_secs()),
        "dispatch.delivery_timeout_seconds",
    )?;
    let retry_backoff = positive_seconds(
        dispatch
            .retry_backoff_seconds
            .unwrap_or(defaults.retry_backoff.as_secs()),
        "dispatch.retry_backoff_seconds",
    )?;

    Ok(DispatchSettings {
        poll_interval,
        delivery_timeout,
        max_delivery_retries: dispatch
            .max_delivery_retries
            .unwrap_or(defaults.max_delivery_retries),
        retry_backoff,
    })
}

fn build_store_settings(store: RawStoreSettings) -> Result<StoreSettings, LoadError> {
    let backend = match store.backend {
        Some(value) => StoreBackend::from_str(&value)
            .map_err(|reason| LoadError::invalid("store.backend", reason))?,
        None => StoreBackend::Memory,
    };

    let redis_url = store.redis_url.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    });
    if backend == StoreBackend::Redis && redis_url.is_none() {
        return Err(LoadError::invalid(
            "store.redis_url",
            "required when the redis backend is selected",
        ));
    }

    let defaults = QueueKeys::default();
    Ok(StoreSettings {
        backend,
        redis_url,
        delayed_messages_key: non_empty(
            store.delayed_messages_key,
            &defaults.delayed_messages,
            "store.delayed_messages_key",
        )?,
        attachment_jobs_key: non_empty(
            store.attachment_jobs_key,
            &defaults.attachment_jobs,
            "store.attachment_jobs_key",
        )?,
        event_index_prefix: non_empty(
            store.event_index_prefix,
            &defaults.event_index_prefix,
            "store.event_index_prefix",
        )?,
    })
}

fn build_cache_settings(
    cache: RawCacheSettings,
    cache_prefix: Option<String>,
) -> Result<CacheSettings, LoadError> {
    let defaults = CacheConfig::default();
    let default_ttl = positive_seconds(
        cache
            .default_ttl_seconds
            .unwrap_or(defaults.default_ttl.as_secs()),
        "cache.default_ttl_seconds",
    )?;
    let key_prefix = non_empty(cache_prefix, &defaults.key_prefix, "store.cache_prefix")?;

    let mut seen = HashSet::new();
    let mut regions = Vec::with_capacity(cache.regions.len());
    for region in cache.regions {
        let name = region.name.trim().to_string();
        if name.is_empty() {
            return Err(LoadError::invalid(
                "cache.regions.name",
                "region name must not be empty",
            ));
        }
        if !seen.insert(name.clone()) {
            return Err(LoadError::invalid(
                "cache.regions.name",
                format!("region `{name}` is declared more than once"),
            ));
        }
        let policy = CachePolicy::from_str(&region.policy)
            .map_err(|reason| LoadError::invalid("cache.regions.policy", reason))?;
        let ttl = region
            .ttl_seconds
            .map(|seconds| positive_seconds(seconds, "cache.regions.ttl_seconds"))
            .transpose()?;

        regions.push(RegionSettings { name, policy, ttl });
    }

    Ok(CacheSettings {
        default_ttl,
        key_prefix,
        regions,
    })
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawDispatchSettings {
    poll_interval_seconds: Option<u64>,
    delivery_timeout_seconds: Option<u64>,
    max_delivery_retries: Option<u32>,
    retry_backoff_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawStoreSettings {
    backend: Option<String>,
    redis_url: Option<String>,
    delayed_messages_key: Option<String>,
    attachment_jobs_key: Option<String>,
    event_index_prefix: Option<String>,
    cache_prefix: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCacheSettings {
    default_ttl_seconds: Option<u64>,
    regions: Vec<RawRegionSettings>,
}

#[derive(Debug, Clone, Deserialize)]
struct RawRegionSettings {
    name: String,
    policy: String,
    #[serde(default)]
    ttl_seconds: Option<u64>,
}

fn positive_seconds(value: u64, key: &'static str) -> Result<Duration, LoadError> {
    if value == 0 {
        return Err(LoadError::invalid(key, "must be greater than zero"));
    }
    Ok(Duration::from_secs(value))
}

fn non_empty(
    value: Option<String>,
    default: &str,
    key: &'static str,
) -> Result<String, LoadError> {
    match value {
        Some(value) if value.trim().is_empty() => {
            Err(LoadError::invalid(key, "must not be empty"))
        }
        Some(value) => Ok(value),
        None => Ok(default.to_string()),
    }
}

#[cfg(test)]
mod tests;
