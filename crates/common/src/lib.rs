//! Shared error helpers used across all warden crates.

pub mod error;

pub use error::FromMessage;
