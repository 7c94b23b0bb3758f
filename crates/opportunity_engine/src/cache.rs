//! Snapshot cache for the last canonical opportunity set.
//!
//! The board only needs "store the latest set" and "give me back the latest
//! set". Where it lives is the adapter's business.

use std::fs::{self, create_dir_all};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use common::Error;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::model::CanonicalOpportunity;

/// A canonical set plus the time it was produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedSnapshot {
    pub opportunities: Vec<CanonicalOpportunity>,
    pub cached_at: DateTime<Utc>,
}

impl CachedSnapshot {
    pub fn new(opportunities: Vec<CanonicalOpportunity>, cached_at: DateTime<Utc>) -> Self {
        Self {
            opportunities,
            cached_at,
        }
    }

    /// Younger than `max_age_secs` at `now`.
    pub fn is_fresh(&self, max_age_secs: u64, now: DateTime<Utc>) -> bool {
        let max_age = i64::try_from(max_age_secs).unwrap_or(i64::MAX);
        (now - self.cached_at).num_seconds() < max_age
    }
}

/// Storage for the most recent snapshot.
pub trait SnapshotCache: Send + Sync {
    fn store(&self, snapshot: &CachedSnapshot) -> common::Result<()>;

    /// `Ok(None)` when nothing has been stored yet.
    fn load(&self) -> common::Result<Option<CachedSnapshot>>;
}

// ── JSON file ─────────────────────────────────────────────────────────

/// One JSON document on disk, replaced on every store.
#[derive(Debug, Clone)]
pub struct JsonFileCache {
    path: PathBuf,
}

impl JsonFileCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn staging_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl SnapshotCache for JsonFileCache {
    fn store(&self, snapshot: &CachedSnapshot) -> common::Result<()> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            create_dir_all(dir)?;
        }
        let body = serde_json::to_vec(snapshot)?;

        // Write aside then rename so readers never see a half-written file.
        let staging = self.staging_path();
        fs::write(&staging, body)?;
        fs::rename(&staging, &self.path)?;

        debug!(
            "cached {} opportunities to {}",
            snapshot.opportunities.len(),
            self.path.display()
        );
        Ok(())
    }

    fn load(&self) -> common::Result<Option<CachedSnapshot>> {
        let body = match fs::read(&self.path) {
            Ok(body) => body,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let snapshot = serde_json::from_slice(&body).map_err(|e| {
            Error::Cache(format!("corrupt snapshot at {}: {}", self.path.display(), e))
        })?;
        Ok(Some(snapshot))
    }
}

// ── In memory ─────────────────────────────────────────────────────────

/// Process-local cache, mostly for tests and `--snapshot` runs.
#[derive(Debug, Default)]
pub struct MemoryCache {
    slot: Mutex<Option<CachedSnapshot>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SnapshotCache for MemoryCache {
    fn store(&self, snapshot: &CachedSnapshot) -> common::Result<()> {
        let mut slot = self
            .slot
            .lock()
            .map_err(|_| Error::Cache("memory cache lock poisoned".into()))?;
        *slot = Some(snapshot.clone());
        Ok(())
    }

    fn load(&self) -> common::Result<Option<CachedSnapshot>> {
        let slot = self
            .slot
            .lock()
            .map_err(|_| Error::Cache("memory cache lock poisoned".into()))?;
        Ok(slot.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn make_snapshot() -> CachedSnapshot {
        let opp = CanonicalOpportunity {
            id: "cached-1".into(),
            ..Default::default()
        };
        CachedSnapshot::new(
            vec![opp],
            Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap(),
        )
    }

    #[test]
    fn test_file_cache_store_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let cache = JsonFileCache::new(dir.path().join("nested/cache/opportunities.json"));

        assert!(cache.load().unwrap().is_none());

        let snapshot = make_snapshot();
        cache.store(&snapshot).unwrap();
        assert_eq!(cache.load().unwrap(), Some(snapshot));
        assert!(!cache.staging_path().exists());
    }

    #[test]
    fn test_file_cache_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let cache = JsonFileCache::new(dir.path().join("opportunities.json"));
        cache.store(&make_snapshot()).unwrap();

        let empty = CachedSnapshot::new(Vec::new(), Utc::now());
        cache.store(&empty).unwrap();
        assert!(cache.load().unwrap().unwrap().opportunities.is_empty());
    }

    #[test]
    fn test_corrupt_file_is_cache_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("opportunities.json");
        fs::write(&path, b"{ not json").unwrap();
        let err = JsonFileCache::new(&path).load().unwrap_err();
        assert!(matches!(err, Error::Cache(_)));
    }

    #[test]
    fn test_memory_cache() {
        let cache = MemoryCache::new();
        assert!(cache.load().unwrap().is_none());
        cache.store(&make_snapshot()).unwrap();
        assert_eq!(cache.load().unwrap().unwrap().opportunities[0].id, "cached-1");
    }

    #[test]
    fn test_freshness() {
        let snapshot = make_snapshot();
        let at = |secs: i64| snapshot.cached_at + Duration::seconds(secs);
        assert!(snapshot.is_fresh(300, at(0)));
        assert!(snapshot.is_fresh(300, at(299)));
        assert!(!snapshot.is_fresh(300, at(300)));
        assert!(!snapshot.is_fresh(300, at(3600)));
    }
}
