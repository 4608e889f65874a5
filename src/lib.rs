//! Herald: deferred notification delivery and commit-synchronized caching.
//!
//! - [`dispatch`]: durable delayed-message and attachment queues drained by a
//!   single interval poller
//! - [`cache`]: per-transaction intent buffering with refresh or evict
//!   policies applied after commit
//! - [`application`]: collaborator contracts (entity lookups, durable store,
//!   notification sender)
//! - [`infra`]: store backends, telemetry and the logging sender

pub mod application;
pub mod cache;
pub mod config;
pub mod dispatch;
pub mod domain;
pub mod infra;
pub mod util;
