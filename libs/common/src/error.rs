//! Unified error type for the arbitrage dashboard.
//!
//! Only the edges of the system produce these: the opportunity feed, config
//! loading and the snapshot cache. The normalization pipeline itself never
//! fails.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("Opportunity feed error (status={status}): {message}")]
    FeedApi { status: u16, message: String },

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Snapshot cache error: {0}")]
    Cache(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}
