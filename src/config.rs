//! Configuration loader: merges env vars, .env file, and config.toml.

use common::Error;
use serde::{Deserialize, Serialize};
use std::path::Path;

use opportunity_engine::config::{CacheConfig, TimingConfig};
use opportunity_engine::FilterSet;

/// Top-level dashboard configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardConfig {
    /// Base URL of the opportunity detection service.
    #[serde(default = "default_feed_url")]
    pub feed_url: String,

    /// Polling parameters.
    #[serde(default)]
    pub timing: TimingConfig,

    /// Snapshot cache parameters.
    #[serde(default)]
    pub cache: CacheConfig,

    /// Initial filter state.
    #[serde(default)]
    pub filters: FilterSet,
}

fn default_feed_url() -> String {
    "http://localhost:8000".into()
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            feed_url: default_feed_url(),
            timing: TimingConfig::default(),
            cache: CacheConfig::default(),
            filters: FilterSet::default(),
        }
    }
}

// ── Config loader ─────────────────────────────────────────────────────

/// Load dashboard configuration from environment and optional config file.
pub fn load_config() -> Result<DashboardConfig, Error> {
    // 1. Load .env file from project root or parent directories.
    if let Err(e) = dotenvy::dotenv() {
        tracing::debug!("No .env file loaded: {}", e);
    }

    // 2. Start with defaults.
    let mut config = DashboardConfig::default();

    // 3. Try loading config.toml if it exists.
    let config_path = Path::new("config.toml");
    if config_path.exists() {
        let contents = std::fs::read_to_string(config_path)
            .map_err(|e| Error::Config(format!("Failed to read config.toml: {}", e)))?;
        config = parse_config(&contents)?;
    }

    // 4. Override with environment variables (highest priority).
    apply_env_overrides(&mut config, |key| std::env::var(key).ok())?;

    // 5. Validate.
    validate(&config)?;

    Ok(config)
}

fn parse_config(contents: &str) -> Result<DashboardConfig, Error> {
    toml::from_str(contents)
        .map_err(|e| Error::Config(format!("Failed to parse config.toml: {}", e)))
}

fn apply_env_overrides(
    config: &mut DashboardConfig,
    var: impl Fn(&str) -> Option<String>,
) -> Result<(), Error> {
    if let Some(url) = var("ARB_FEED_URL") {
        config.feed_url = url;
    }
    if let Some(raw) = var("ARB_POLL_INTERVAL_SECS") {
        config.timing.poll_interval_secs = raw.trim().parse().map_err(|_| {
            Error::Config(format!("ARB_POLL_INTERVAL_SECS must be an integer, got '{}'", raw))
        })?;
    }
    if let Some(path) = var("ARB_CACHE_PATH") {
        config.cache.path = path;
    }
    if let Some(live) = var("ARB_LIVE_MODE") {
        config.timing.live_mode = live != "0" && live.to_lowercase() != "false";
    }
    Ok(())
}

fn validate(config: &DashboardConfig) -> Result<(), Error> {
    if config.feed_url.trim().is_empty() {
        return Err(Error::Config(
            "feed_url is required (set ARB_FEED_URL or config.toml)".into(),
        ));
    }
    if config.timing.poll_interval_secs == 0 {
        return Err(Error::Config("timing.poll_interval_secs must be > 0".into()));
    }
    if config.filters.min_profit > config.filters.max_profit {
        return Err(Error::Config(format!(
            "filters.min_profit ({}) exceeds filters.max_profit ({})",
            config.filters.min_profit, config.filters.max_profit
        )));
    }
    Ok(())
}
