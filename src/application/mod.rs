//! Collaborator contracts and top-level error type.

pub mod error;
pub mod notify;
pub mod repos;
