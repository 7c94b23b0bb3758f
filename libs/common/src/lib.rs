//! Shared wire types and error definitions for the arbitrage dashboard.

pub mod error;
pub mod time;
pub mod types;

pub use error::Error;
pub use time::parse_timestamp;
pub use types::*;

/// Convenience Result alias.
pub type Result<T> = std::result::Result<T, Error>;
