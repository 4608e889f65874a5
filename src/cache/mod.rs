//! Commit-bound cache consistency.
//!
//! Write paths register [`CacheMutationIntent`]s on a per-transaction
//! [`CommitEventBus`]. Intents reach the cache only after the transaction
//! commits, where the [`CacheSynchronizer`] refreshes or evicts each entry
//! according to its region's policy. Readers go through [`CacheStore`].
//!
//! ## Configuration
//!
//! ```toml
//! [cache]
//! default_ttl_seconds = 600
//!
//! [[cache.regions]]
//! name = "parent"
//! policy = "refresh"
//!
//! [[cache.regions]]
//! name = "child"
//! policy = "evict"
//! ttl_seconds = 120
//! ```

mod config;
mod error;
mod events;
mod keys;
mod store;
mod synchronizer;
mod trigger;

pub use config::{CacheConfig, CachePolicy, RegionConfig};
pub use error::CacheError;
pub use events::{CacheMutationIntent, CommitEventBus};
pub use keys::CacheKey;
pub use store::CacheStore;
pub use synchronizer::{CacheSynchronizer, CacheSynchronizerBuilder};
pub use trigger::CacheTrigger;
