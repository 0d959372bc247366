//! File-backed TTL cache for remote geometry.
//!
//! One JSON file per entry under a cache directory, named
//! `<prefix><key>.json` with body `{"data": ..., "timestamp": ms, "ttl": ms}`.
//! The cache is best-effort, never a system of record: every storage or
//! parse error is swallowed and reported as a miss, and a failed write is
//! retried once after evicting expired entries, then dropped.
//!
//! An entry past its TTL is absent for [`PlotCache::get`] but stays on disk
//! so [`PlotCache::get_stale`] can serve it as a fallback when a live fetch
//! fails. Writes replace the whole entry, so readers never observe a
//! partial update.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

#[derive(Serialize, Deserialize)]
struct CacheEntry<T> {
    data: T,
    /// Creation time, epoch milliseconds.
    timestamp: i64,
    /// Time to live, milliseconds.
    ttl: u64,
}

impl<T> CacheEntry<T> {
    fn is_fresh(&self, now_ms: i64) -> bool {
        now_ms - self.timestamp < self.ttl as i64
    }
}

/// Durable key-value cache with TTL and explicit stale reads.
#[derive(Debug, Clone)]
pub struct PlotCache {
    dir: PathBuf,
    prefix: String,
    default_ttl: Duration,
}

impl PlotCache {
    pub fn new(dir: impl Into<PathBuf>, prefix: impl Into<String>, default_ttl: Duration) -> Self {
        Self {
            dir: dir.into(),
            prefix: prefix.into(),
            default_ttl,
        }
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        // Keys are internal ("garden_1027", "garden_region"); squash anything
        // that could escape the cache directory.
        let safe: String = key
            .chars()
            .map(|c| if c.is_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
            .collect();
        self.dir.join(format!("{}{}.json", self.prefix, safe))
    }

    fn read_entry<T: DeserializeOwned>(&self, key: &str) -> Option<CacheEntry<T>> {
        let path = self.entry_path(key);
        let raw = fs::read_to_string(&path).ok()?;
        match serde_json::from_str(&raw) {
            Ok(entry) => Some(entry),
            Err(e) => {
                debug!("cache entry {} unreadable, treating as miss: {}", key, e);
                None
            }
        }
    }

    /// Value for `key` if present and within TTL.
    ///
    /// An expired entry reads as absent here but is left on disk for
    /// [`PlotCache::get_stale`].
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let entry = self.read_entry::<T>(key)?;
        if entry.is_fresh(Utc::now().timestamp_millis()) {
            Some(entry.data)
        } else {
            None
        }
    }

    /// Value for `key` regardless of TTL. Error-path fallback only.
    pub fn get_stale<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.read_entry::<T>(key).map(|entry| entry.data)
    }

    /// Store `value` under `key`, replacing any previous entry wholesale.
    ///
    /// On a write failure every expired entry across the keyspace is
    /// evicted and the write retried once; a second failure is logged and
    /// dropped.
    pub fn set<T: Serialize>(&self, key: &str, value: &T, ttl: Duration) {
        let entry = CacheEntry {
            data: value,
            timestamp: Utc::now().timestamp_millis(),
            ttl: ttl.as_millis() as u64,
        };
        let body = match serde_json::to_string(&entry) {
            Ok(b) => b,
            Err(e) => {
                warn!("cache serialize failed for {}: {}", key, e);
                return;
            }
        };

        if let Err(first) = self.write_file(key, &body) {
            self.evict_expired();
            if let Err(second) = self.write_file(key, &body) {
                warn!(
                    "cache write for {} dropped after retry: {} (first: {})",
                    key, second, first
                );
            }
        }
    }

    /// Store with the cache's default TTL.
    pub fn set_default<T: Serialize>(&self, key: &str, value: &T) {
        self.set(key, value, self.default_ttl);
    }

    fn write_file(&self, key: &str, body: &str) -> std::io::Result<()> {
        fs::create_dir_all(&self.dir)?;
        fs::write(self.entry_path(key), body)
    }

    /// Remove one entry, or every entry this cache owns when `key` is
    /// `None`. Files without this cache's prefix are never touched.
    pub fn clear(&self, key: Option<&str>) {
        match key {
            Some(k) => {
                let _ = fs::remove_file(self.entry_path(k));
            }
            None => self.for_each_owned_file(|path, _| {
                let _ = fs::remove_file(path);
            }),
        }
    }

    /// Delete every owned entry whose TTL has lapsed.
    pub fn evict_expired(&self) {
        let now_ms = Utc::now().timestamp_millis();
        self.for_each_owned_file(|path, raw| {
            if let Ok(entry) = serde_json::from_str::<CacheEntry<serde_json::Value>>(raw) {
                if entry.is_fresh(now_ms) {
                    return;
                }
            }
            // Expired or unparseable either way.
            let _ = fs::remove_file(path);
        });
    }

    fn for_each_owned_file(&self, mut f: impl FnMut(&Path, &str)) {
        let Ok(dir) = fs::read_dir(&self.dir) else {
            return;
        };
        for dirent in dir.flatten() {
            let path = dirent.path();
            let owned = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with(&self.prefix) && n.ends_with(".json"));
            if !owned {
                continue;
            }
            let raw = fs::read_to_string(&path).unwrap_or_default();
            f(&path, &raw);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::PlotCache;
    use std::fs;
    use std::thread::sleep;
    use std::time::Duration;

    fn make_cache(dir: &tempfile::TempDir) -> PlotCache {
        PlotCache::new(dir.path(), "plotloc_", Duration::from_secs(3600))
    }

    #[test]
    fn test_get_within_ttl() {
        let dir = tempfile::tempdir().unwrap();
        let cache = make_cache(&dir);
        cache.set("k", &"value".to_string(), Duration::from_millis(100));
        assert_eq!(cache.get::<String>("k"), Some("value".into()));
    }

    #[test]
    fn test_expired_entry_only_readable_stale() {
        let dir = tempfile::tempdir().unwrap();
        let cache = make_cache(&dir);
        cache.set("k", &42u32, Duration::from_millis(40));
        sleep(Duration::from_millis(80));
        assert_eq!(cache.get::<u32>("k"), None);
        assert_eq!(cache.get_stale::<u32>("k"), Some(42));
    }

    #[test]
    fn test_second_set_replaces_first() {
        let dir = tempfile::tempdir().unwrap();
        let cache = make_cache(&dir);
        cache.set_default("k", &"old".to_string());
        cache.set_default("k", &"new".to_string());
        assert_eq!(cache.get::<String>("k"), Some("new".into()));
    }

    #[test]
    fn test_missing_and_corrupt_entries_are_misses() {
        let dir = tempfile::tempdir().unwrap();
        let cache = make_cache(&dir);
        assert_eq!(cache.get::<String>("nope"), None);
        assert_eq!(cache.get_stale::<String>("nope"), None);

        fs::write(dir.path().join("plotloc_bad.json"), "{not json").unwrap();
        assert_eq!(cache.get::<String>("bad"), None);
        assert_eq!(cache.get_stale::<String>("bad"), None);
    }

    #[test]
    fn test_clear_one_and_all_respects_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let cache = make_cache(&dir);
        cache.set_default("a", &1u32);
        cache.set_default("b", &2u32);
        let foreign = dir.path().join("unrelated.json");
        fs::write(&foreign, "{}").unwrap();

        cache.clear(Some("a"));
        assert_eq!(cache.get::<u32>("a"), None);
        assert_eq!(cache.get::<u32>("b"), Some(2));

        cache.clear(None);
        assert_eq!(cache.get::<u32>("b"), None);
        assert!(foreign.exists(), "clear must not touch unrelated files");
    }

    #[test]
    fn test_evict_expired_keeps_fresh_entries() {
        let dir = tempfile::tempdir().unwrap();
        let cache = make_cache(&dir);
        cache.set("old", &1u32, Duration::from_millis(20));
        cache.set("fresh", &2u32, Duration::from_secs(3600));
        sleep(Duration::from_millis(50));

        cache.evict_expired();
        assert_eq!(cache.get_stale::<u32>("old"), None);
        assert_eq!(cache.get::<u32>("fresh"), Some(2));
    }

    #[test]
    fn test_keys_cannot_escape_cache_dir() {
        let dir = tempfile::tempdir().unwrap();
        let cache = make_cache(&dir);
        cache.set_default("../escape", &1u32);
        assert_eq!(cache.get::<u32>("../escape"), Some(1));
        // Path separators are squashed, so the entry lands inside the dir.
        assert!(dir.path().join("plotloc____escape.json").exists());
    }
}
