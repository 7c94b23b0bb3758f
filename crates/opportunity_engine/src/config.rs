//! Configuration structs for the opportunity engine.

use serde::{Deserialize, Serialize};

/// Feed polling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingConfig {
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Keep polling after the first fetch.
    #[serde(default = "default_true")]
    pub live_mode: bool,
}

/// Snapshot cache location and freshness.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_cache_path")]
    pub path: String,

    /// A snapshot older than this is not used at startup.
    #[serde(default = "default_cache_max_age")]
    pub max_age_secs: u64,
}

// ── Defaults ──────────────────────────────────────────────────────────

fn default_true() -> bool {
    true
}
fn default_poll_interval() -> u64 {
    20
}
fn default_request_timeout() -> u64 {
    15
}
fn default_cache_path() -> String {
    "cache/opportunities.json".into()
}
fn default_cache_max_age() -> u64 {
    300
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval(),
            request_timeout_secs: default_request_timeout(),
            live_mode: true,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            path: default_cache_path(),
            max_age_secs: default_cache_max_age(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_sections_fill_defaults() {
        let timing: TimingConfig = serde_json::from_str(r#"{"poll_interval_secs": 5}"#).unwrap();
        assert_eq!(timing.poll_interval_secs, 5);
        assert_eq!(timing.request_timeout_secs, 15);
        assert!(timing.live_mode);

        let cache: CacheConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(cache.path, "cache/opportunities.json");
        assert_eq!(cache.max_age_secs, 300);
    }
}
