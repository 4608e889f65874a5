//! Infrastructure adapters and runtime bootstrap.

pub mod error;
pub mod sender;
pub mod store;
pub mod telemetry;
