//! Queue payload types.

pub mod error;
pub mod messages;
