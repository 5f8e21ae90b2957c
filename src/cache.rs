//! Content-addressed cache for downloaded cookbook archives.
//!
//! Entries are keyed by the SHA-256 of their source identity (source URL +
//! name + version), sharded two levels deep (`<base>/<h0:2>/<h2:4>/<hash>`)
//! with a JSON `.meta` sidecar carrying size, checksum, and timestamps.
//! Eviction is LRU down to 80% of `max_size` once a write would exceed it.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("corrupted cache metadata at {path}: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("checksum mismatch for {key}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        key: String,
        expected: String,
        actual: String,
    },
}

/// On-disk sidecar metadata for one cached entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: String,
    pub checksum: String,
    pub size: u64,
    pub created_at: u64,
    pub last_accessed: u64,
    pub ttl_seconds: Option<u64>,
    #[serde(default)]
    pub access_count: u64,
}

impl CacheEntry {
    fn is_expired(&self, now: u64) -> bool {
        match self.ttl_seconds {
            Some(ttl) => now.saturating_sub(self.created_at) > ttl,
            None => false,
        }
    }
}

#[derive(Debug, Default, Clone, Serialize)]
pub struct Stats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

impl Stats {
    #[must_use]
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

struct Inner {
    current_size: u64,
    stats: Stats,
}

/// A content-addressed, size-bounded, TTL-aware cache of downloaded
/// cookbook archives.
pub struct Cache {
    base_dir: PathBuf,
    max_size: u64,
    default_ttl: Option<Duration>,
    inner: RwLock<Inner>,
}

impl std::fmt::Debug for Cache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cache")
            .field("base_dir", &self.base_dir)
            .field("max_size", &self.max_size)
            .finish_non_exhaustive()
    }
}

impl Cache {
    /// # Errors
    ///
    /// Returns [`CacheError::Io`] if the base directory cannot be created
    /// or its current size cannot be computed.
    pub fn new(base_dir: PathBuf, max_size: u64, default_ttl: Option<Duration>) -> Result<Self, CacheError> {
        std::fs::create_dir_all(&base_dir).map_err(|source| CacheError::Io {
            path: base_dir.clone(),
            source,
        })?;
        let current_size = Self::scan_total_size(&base_dir);
        Ok(Self {
            base_dir,
            max_size,
            default_ttl,
            inner: RwLock::new(Inner {
                current_size,
                stats: Stats::default(),
            }),
        })
    }

    /// The directory this cache is rooted at.
    #[must_use]
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Derive the cache key for a cookbook version pulled from one source.
    #[must_use]
    pub fn key_for(source_url: &str, name: &str, version: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(source_url.as_bytes());
        hasher.update(b"\0");
        hasher.update(name.as_bytes());
        hasher.update(b"\0");
        hasher.update(version.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    fn paths_for(&self, key: &str) -> (PathBuf, PathBuf) {
        let shard1 = key.get(0..2).unwrap_or("00");
        let shard2 = key.get(2..4).unwrap_or("00");
        let dir = self.base_dir.join(shard1).join(shard2);
        (dir.join(key), dir.join(format!("{key}.meta")))
    }

    /// Fetch cached bytes for `key`, or `None` on a miss (including an
    /// expired or corrupted entry, which counts as a miss rather than an
    /// error).
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Io`] if reading an otherwise-valid entry
    /// fails.
    pub fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        let (data_path, meta_path) = self.paths_for(key);
        if !data_path.exists() || !meta_path.exists() {
            self.record_miss();
            return Ok(None);
        }

        let meta = match self.read_meta(&meta_path) {
            Ok(meta) => meta,
            Err(_) => {
                // A corrupted sidecar degrades to a miss; skip, don't abort.
                self.record_miss();
                return Ok(None);
            }
        };

        let now = now_unix();
        if meta.is_expired(now) {
            self.record_miss();
            return Ok(None);
        }

        let bytes = std::fs::read(&data_path).map_err(|source| CacheError::Io {
            path: data_path.clone(),
            source,
        })?;

        let actual = format!("{:x}", Sha256::digest(&bytes));
        if actual != meta.checksum {
            // Corrupted data file: degrade to a miss and remove the
            // entry so a future `put` starts clean.
            let _ = remove_if_exists(&data_path);
            let _ = remove_if_exists(&meta_path);
            let mut inner = self.inner.write().unwrap_or_else(std::sync::PoisonError::into_inner);
            inner.current_size = inner.current_size.saturating_sub(meta.size);
            inner.stats.misses += 1;
            return Ok(None);
        }

        self.touch(&meta_path, &meta, now);
        self.record_hit();
        Ok(Some(bytes))
    }

    /// Store `bytes` under `key`, evicting older entries first if needed.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Io`] if the write fails.
    pub fn put(&self, key: &str, bytes: &[u8], ttl: Option<Duration>) -> Result<(), CacheError> {
        let (data_path, meta_path) = self.paths_for(key);
        let dir = data_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.base_dir.clone());
        std::fs::create_dir_all(&dir).map_err(|source| CacheError::Io {
            path: dir.clone(),
            source,
        })?;

        let size = bytes.len() as u64;
        self.ensure_space(size)?;

        let checksum = format!("{:x}", Sha256::digest(bytes));
        let now = now_unix();
        let entry = CacheEntry {
            key: key.to_string(),
            checksum,
            size,
            created_at: now,
            last_accessed: now,
            ttl_seconds: ttl.or(self.default_ttl).map(|d| d.as_secs()),
            access_count: 0,
        };

        // Write data, then metadata, then update the tracked size, so a
        // crash mid-write leaves at worst an orphaned data file (cleaned
        // up on the next `cleanup` pass) rather than a metadata entry
        // pointing at missing bytes.
        std::fs::write(&data_path, bytes).map_err(|source| CacheError::Io {
            path: data_path.clone(),
            source,
        })?;
        self.write_meta(&meta_path, &entry)?;

        let mut inner = self.inner.write().unwrap_or_else(std::sync::PoisonError::into_inner);
        inner.current_size += size;
        Ok(())
    }

    /// Remove a single entry, if present.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Io`] if removal fails for a reason other than
    /// the entry already being absent.
    pub fn delete(&self, key: &str) -> Result<(), CacheError> {
        let (data_path, meta_path) = self.paths_for(key);
        let size = self
            .read_meta(&meta_path)
            .map(|meta| meta.size)
            .unwrap_or(0);

        remove_if_exists(&data_path)?;
        remove_if_exists(&meta_path)?;

        let mut inner = self.inner.write().unwrap_or_else(std::sync::PoisonError::into_inner);
        inner.current_size = inner.current_size.saturating_sub(size);
        Ok(())
    }

    /// Remove every cached entry.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Io`] if the base directory cannot be cleared.
    pub fn clear(&self) -> Result<(), CacheError> {
        if self.base_dir.exists() {
            std::fs::remove_dir_all(&self.base_dir).map_err(|source| CacheError::Io {
                path: self.base_dir.clone(),
                source,
            })?;
        }
        std::fs::create_dir_all(&self.base_dir).map_err(|source| CacheError::Io {
            path: self.base_dir.clone(),
            source,
        })?;
        let mut inner = self.inner.write().unwrap_or_else(std::sync::PoisonError::into_inner);
        inner.current_size = 0;
        Ok(())
    }

    /// Remove expired entries and any data file lacking a sidecar (left
    /// behind by an interrupted `put`). `is_cancelled` is polled between
    /// entries so a long cleanup can be aborted without corrupting state.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Io`] if directory traversal fails.
    pub fn cleanup(&self, is_cancelled: impl Fn() -> bool) -> Result<u64, CacheError> {
        let now = now_unix();
        let mut removed = 0u64;

        for entry in walkdir::WalkDir::new(&self.base_dir)
            .into_iter()
            .filter_map(Result::ok)
        {
            if is_cancelled() {
                break;
            }
            let path = entry.path();
            let Some(ext) = path.extension() else {
                continue;
            };
            if ext != "meta" {
                continue;
            }

            let meta = match self.read_meta(path) {
                Ok(meta) => meta,
                Err(_) => continue,
            };

            if meta.is_expired(now) {
                let data_path = path.with_extension("");
                let size = meta.size;
                remove_if_exists(&data_path)?;
                remove_if_exists(path)?;
                let mut inner = self.inner.write().unwrap_or_else(std::sync::PoisonError::into_inner);
                inner.current_size = inner.current_size.saturating_sub(size);
                removed += 1;
            }
        }

        Ok(removed)
    }

    #[must_use]
    pub fn stats(&self) -> Stats {
        self.inner
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .stats
            .clone()
    }

    #[must_use]
    pub fn current_size(&self) -> u64 {
        self.inner
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .current_size
    }

    /// Evict the least-recently-accessed entries until there is room for
    /// `incoming_size` without exceeding `max_size`, down to 80% of
    /// `max_size` so a single large write doesn't immediately trigger
    /// another eviction pass. Runs under the writer lock, matching the
    /// cache's documented current behavior.
    fn ensure_space(&self, incoming_size: u64) -> Result<(), CacheError> {
        let mut inner = self.inner.write().unwrap_or_else(std::sync::PoisonError::into_inner);
        if inner.current_size + incoming_size <= self.max_size {
            return Ok(());
        }

        let target = (self.max_size * 80) / 100;
        let mut entries = self.list_entries()?;
        entries.sort_by_key(|(_, meta)| meta.last_accessed);

        for (meta_path, meta) in entries {
            if inner.current_size + incoming_size <= target {
                break;
            }
            let data_path = meta_path.with_extension("");
            remove_if_exists(&data_path)?;
            remove_if_exists(&meta_path)?;
            inner.current_size = inner.current_size.saturating_sub(meta.size);
            inner.stats.evictions += 1;
        }

        Ok(())
    }

    fn list_entries(&self) -> Result<Vec<(PathBuf, CacheEntry)>, CacheError> {
        let mut entries = Vec::new();
        for dir_entry in walkdir::WalkDir::new(&self.base_dir)
            .into_iter()
            .filter_map(Result::ok)
        {
            let path = dir_entry.path();
            if path.extension().is_none_or(|ext| ext != "meta") {
                continue;
            }
            if let Ok(meta) = self.read_meta(path) {
                entries.push((path.to_path_buf(), meta));
            }
        }
        Ok(entries)
    }

    fn read_meta(&self, path: &Path) -> Result<CacheEntry, CacheError> {
        let bytes = std::fs::read(path).map_err(|source| CacheError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_slice(&bytes).map_err(|source| CacheError::Corrupt {
            path: path.to_path_buf(),
            source,
        })
    }

    fn write_meta(&self, path: &Path, entry: &CacheEntry) -> Result<(), CacheError> {
        let bytes = serde_json::to_vec_pretty(entry).map_err(|source| CacheError::Corrupt {
            path: path.to_path_buf(),
            source,
        })?;
        std::fs::write(path, bytes).map_err(|source| CacheError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    fn touch(&self, meta_path: &Path, meta: &CacheEntry, now: u64) {
        let mut updated = meta.clone();
        updated.last_accessed = now;
        updated.access_count += 1;
        let _ = self.write_meta(meta_path, &updated);
    }

    fn record_hit(&self) {
        let mut inner = self.inner.write().unwrap_or_else(std::sync::PoisonError::into_inner);
        inner.stats.hits += 1;
    }

    fn record_miss(&self) {
        let mut inner = self.inner.write().unwrap_or_else(std::sync::PoisonError::into_inner);
        inner.stats.misses += 1;
    }

    fn scan_total_size(base_dir: &Path) -> u64 {
        walkdir::WalkDir::new(base_dir)
            .into_iter()
            .filter_map(Result::ok)
            .filter(|e| e.path().extension().is_none_or(|ext| ext != "meta"))
            .filter_map(|e| e.metadata().ok())
            .map(|m| m.len())
            .sum()
    }
}

fn remove_if_exists(path: &Path) -> Result<(), CacheError> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(CacheError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

fn now_unix() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Human-readable byte size, e.g. `"3.2 MB"`, for CLI `cache info` output.
#[must_use]
pub fn human_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{size:.1} {}", UNITS.get(unit).copied().unwrap_or("B"))
    }
}

/// Summary stats rendered as JSON for `larder cache info`.
#[derive(Debug, Serialize)]
pub struct CacheInfo {
    pub entry_count: usize,
    pub total_size: u64,
    pub total_size_human: String,
    pub max_size: u64,
    pub hits: u64,
    pub misses: u64,
    pub hit_rate: f64,
    pub evictions: u64,
}

impl Cache {
    /// # Errors
    ///
    /// Returns [`CacheError::Io`] if directory traversal fails.
    pub fn info(&self) -> Result<CacheInfo, CacheError> {
        let entries = self.list_entries()?;
        let stats = self.stats();
        Ok(CacheInfo {
            entry_count: entries.len(),
            total_size: self.current_size(),
            total_size_human: human_bytes(self.current_size()),
            max_size: self.max_size,
            hits: stats.hits,
            misses: stats.misses,
            hit_rate: stats.hit_rate(),
            evictions: stats.evictions,
        })
    }

    /// List cached entries sorted by key, for `larder cache list`.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Io`] if directory traversal fails.
    pub fn list(&self) -> Result<BTreeMap<String, CacheEntry>, CacheError> {
        Ok(self
            .list_entries()?
            .into_iter()
            .map(|(_, meta)| (meta.key.clone(), meta))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_cache() -> (tempfile::TempDir, Cache) {
        let dir = tempfile::tempdir().unwrap();
        let cache = Cache::new(dir.path().to_path_buf(), 10_000, None).unwrap();
        (dir, cache)
    }

    #[test]
    fn round_trips_bytes() {
        let (_dir, cache) = test_cache();
        let key = Cache::key_for("https://supermarket.chef.io", "nginx", "2.7.6");
        cache.put(&key, b"tarball bytes", None).unwrap();
        let bytes = cache.get(&key).unwrap();
        assert_eq!(bytes, Some(b"tarball bytes".to_vec()));
    }

    #[test]
    fn miss_records_stats() {
        let (_dir, cache) = test_cache();
        let hit = cache.get("nonexistent").unwrap();
        assert_eq!(hit, None);
        assert_eq!(cache.stats().misses, 1);
    }

    #[test]
    fn ttl_expiry_is_a_miss() {
        let (_dir, cache) = test_cache();
        let key = "expiring";
        cache
            .put(key, b"data", Some(Duration::from_secs(0)))
            .unwrap();
        std::thread::sleep(Duration::from_millis(1100));
        assert_eq!(cache.get(key).unwrap(), None);
    }

    #[test]
    fn eviction_keeps_size_under_max() {
        let dir = tempfile::tempdir().unwrap();
        let cache = Cache::new(dir.path().to_path_buf(), 100, None).unwrap();
        for i in 0..20 {
            let key = format!("entry-{i}");
            cache.put(&key, &vec![b'x'; 20], None).unwrap();
        }
        assert!(cache.current_size() <= 100);
        assert!(cache.stats().evictions > 0);
    }

    #[test]
    fn corrupted_data_file_is_a_miss_and_is_removed() {
        let (_dir, cache) = test_cache();
        let key = "nginx";
        cache.put(key, b"tarball bytes", None).unwrap();

        let (data_path, meta_path) = cache.paths_for(key);
        std::fs::write(&data_path, b"tampered bytes").unwrap();

        assert_eq!(cache.get(key).unwrap(), None);
        assert!(!data_path.exists());
        assert!(!meta_path.exists());
    }

    #[test]
    fn hit_increments_access_count() {
        let (_dir, cache) = test_cache();
        let key = "nginx";
        cache.put(key, b"tarball bytes", None).unwrap();
        cache.get(key).unwrap();
        cache.get(key).unwrap();

        let (_, meta_path) = cache.paths_for(key);
        let meta = cache.read_meta(&meta_path).unwrap();
        assert_eq!(meta.access_count, 2);
    }

    #[test]
    fn human_bytes_formats_units() {
        assert_eq!(human_bytes(512), "512 B");
        assert_eq!(human_bytes(2048), "2.0 KB");
    }
}
