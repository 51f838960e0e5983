//! File-backed TTL cache.

use std::collections::BTreeMap;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Utc;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, instrument, warn};

use bulwark_core::config::CacheSection;
use bulwark_core::paths::temp_path;
use bulwark_core::types::CacheEntry;

type Entries = BTreeMap<String, CacheEntry>;

/// Persistent cache with per-entry expiry.
///
/// Thread-safe. Every public call runs a full load → mutate → save cycle
/// under one store-wide lock, so calls on the same instance never
/// interleave. Two instances (or processes) sharing a file are last-writer-wins.
///
/// # File Format
///
/// ```text
/// { "<key>": { "created_at": RFC3339, "payload": <json>, "expires_at": RFC3339 }, ... }
/// ```
///
/// A missing or corrupt file reads as an empty cache. Failed saves are
/// logged and dropped.
pub struct TtlCache {
    /// Path to the backing document
    path: PathBuf,
    /// Lifetime applied by [`TtlCache::set`]
    ttl: Duration,
    /// Store-wide lock held across each load/mutate/save cycle
    lock: Mutex<()>,
}

impl TtlCache {
    /// Creates a cache over `path` with the given default TTL.
    ///
    /// Nothing is read or written until the first call.
    pub fn new(path: impl AsRef<Path>, ttl: Duration) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            ttl,
            lock: Mutex::new(()),
        }
    }

    /// Creates a cache using the TTL from the policy configuration.
    pub fn with_config(path: impl AsRef<Path>, config: &CacheSection) -> Self {
        Self::new(path, config.ttl())
    }

    /// Gets a valid cached value.
    ///
    /// Purges every expired entry from storage as a side effect.
    #[instrument(skip(self))]
    pub fn get(&self, key: &str) -> Option<Value> {
        let _guard = self.lock.lock();
        let mut entries = self.load();

        let purged = Self::purge(&mut entries);
        if purged > 0 {
            debug!(purged, "Purged expired cache entries");
            self.save(&entries);
        }

        entries.remove(key).map(|entry| entry.payload)
    }

    /// Gets a valid cached value and decodes it into `T`.
    ///
    /// Returns `None` if the key is absent, expired, or does not decode.
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.get(key)
            .and_then(|value| serde_json::from_value(value).ok())
    }

    /// Caches a value with the default TTL.
    pub fn set(&self, key: &str, value: Value) {
        self.set_with_ttl(key, value, self.ttl);
    }

    /// Caches a value with a custom TTL, overwriting any previous entry.
    #[instrument(skip(self, value))]
    pub fn set_with_ttl(&self, key: &str, value: Value, ttl: Duration) {
        let _guard = self.lock.lock();
        let mut entries = self.load();
        entries.insert(key.to_string(), CacheEntry::new(value, ttl));
        self.save(&entries);
    }

    /// Returns true if a valid entry exists for `key`.
    pub fn has_valid(&self, key: &str) -> bool {
        let _guard = self.lock.lock();
        let now = Utc::now();
        self.load()
            .get(key)
            .is_some_and(|entry| entry.is_valid_at(now))
    }

    /// Removes an entry. Returns true if it existed.
    pub fn remove(&self, key: &str) -> bool {
        let _guard = self.lock.lock();
        let mut entries = self.load();
        let existed = entries.remove(key).is_some();
        if existed {
            self.save(&entries);
        }
        existed
    }

    /// Clears all cached entries.
    pub fn clear(&self) {
        let _guard = self.lock.lock();
        self.save(&Entries::new());
    }

    /// Removes all expired entries. Returns how many were dropped.
    pub fn purge_expired(&self) -> usize {
        let _guard = self.lock.lock();
        let mut entries = self.load();
        let purged = Self::purge(&mut entries);
        if purged > 0 {
            self.save(&entries);
        }
        purged
    }

    /// Returns the number of stored entries, expired ones included.
    pub fn len(&self) -> usize {
        let _guard = self.lock.lock();
        self.load().len()
    }

    /// Returns true if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns cache statistics.
    pub fn stats(&self) -> CacheStats {
        let _guard = self.lock.lock();
        let entries = self.load();
        let now = Utc::now();
        let valid = entries.values().filter(|e| e.is_valid_at(now)).count();

        CacheStats {
            total_entries: entries.len(),
            valid_entries: valid,
            expired_entries: entries.len() - valid,
        }
    }

    /// Returns the backing file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the default TTL.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn purge(entries: &mut Entries) -> usize {
        let now = Utc::now();
        let before = entries.len();
        entries.retain(|_, entry| entry.is_valid_at(now));
        before - entries.len()
    }

    /// Reads the backing document. Never fails.
    fn load(&self) -> Entries {
        let contents = match fs::read(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Entries::new(),
            Err(e) => {
                warn!(path = ?self.path, error = %e, "Failed to read cache file, treating as empty");
                return Entries::new();
            }
        };

        serde_json::from_slice(&contents).unwrap_or_else(|e| {
            warn!(path = ?self.path, error = %e, "Corrupt cache file, treating as empty");
            Entries::new()
        })
    }

    /// Writes the backing document. Never fails.
    fn save(&self, entries: &Entries) {
        if let Err(e) = self.try_save(entries) {
            warn!(path = ?self.path, error = %e, "Failed to save cache file");
        }
    }

    fn try_save(&self, entries: &Entries) -> std::io::Result<()> {
        let serialized = serde_json::to_vec(entries)?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        // Write atomically (write to temp, then rename)
        let temp = temp_path(&self.path);
        let mut file = fs::File::create(&temp)?;
        file.write_all(&serialized)?;
        file.sync_all()?;

        fs::rename(&temp, &self.path)
    }
}

/// Cache statistics.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CacheStats {
    /// Total entries (including expired)
    pub total_entries: usize,
    /// Valid (non-expired) entries
    pub valid_entries: usize,
    /// Expired entries not yet purged
    pub expired_entries: usize,
}
