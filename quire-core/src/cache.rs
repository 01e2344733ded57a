//! Persistent key/value cache shared by plugins.
//!
//! Plugins use the cache as an opaque memoizer keyed by content hashes.
//! Backend failures never abort a build: they are logged and reported as
//! misses, and the caller recomputes.

use crate::error::CacheError;
use chrono::Utc;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::warn;

/// Version tag written into every on-disk entry
const CACHE_VERSION: u32 = 1;

/// Statistics about cache usage
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

impl CacheStats {
    /// Get cache hit rate (0.0 to 1.0)
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

impl std::fmt::Display for CacheStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "hits: {} | misses: {} | hit rate: {:.1}% | entries: {}",
            self.hits,
            self.misses,
            self.hit_rate() * 100.0,
            self.entries
        )
    }
}

/// Derive a cache key from several components
pub fn cache_key(components: &[&str]) -> String {
    let mut hasher = blake3::Hasher::new();
    for component in components {
        hasher.update(component.as_bytes());
        hasher.update(&[0]);
    }
    hasher.finalize().to_hex().to_string()
}

/// A key/value store with expiring entries.
///
/// A `ttl` of `None` applies the store's default lifetime.
pub trait CacheStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;

    fn set(&self, key: &str, value: &str, ttl: Option<Duration>);

    /// Store only if the key is absent or expired; returns whether it stored
    fn add(&self, key: &str, value: &str, ttl: Option<Duration>) -> bool;

    fn remove(&self, key: &str) -> bool;

    fn clear(&self);

    fn stats(&self) -> CacheStats;
}

/// Typed JSON helpers over any [`CacheStore`]
pub trait CacheStoreExt: CacheStore {
    fn get_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = self.get(key)?;
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(err) => {
                warn!("Discarding unreadable cache entry {}: {}", key, err);
                None
            }
        }
    }

    fn set_json<T: Serialize>(&self, key: &str, value: &T, ttl: Option<Duration>) {
        match serde_json::to_string(value) {
            Ok(raw) => self.set(key, &raw, ttl),
            Err(err) => warn!("Could not serialize cache entry {}: {}", key, err),
        }
    }
}

impl<S: CacheStore + ?Sized> CacheStoreExt for S {}

fn now() -> i64 {
    Utc::now().timestamp()
}

fn expiry(ttl: Option<Duration>, default_ttl: Option<Duration>) -> Option<i64> {
    ttl.or(default_ttl)
        .map(|ttl| now().saturating_add(i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX)))
}

fn is_expired(expires_at: Option<i64>) -> bool {
    expires_at.is_some_and(|at| at <= now())
}

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
}

impl Counters {
    fn record<T>(&self, value: Option<T>) -> Option<T> {
        let counter = if value.is_some() {
            &self.hits
        } else {
            &self.misses
        };
        counter.fetch_add(1, Ordering::Relaxed);
        value
    }

    fn snapshot(&self, entries: usize) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries,
        }
    }

    fn reset(&self) {
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
    }
}

/// Process-local cache
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, (String, Option<i64>)>>,
    default_ttl: Option<Duration>,
    counters: Counters,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_default_ttl(default_ttl: Duration) -> Self {
        Self {
            default_ttl: Some(default_ttl),
            ..Self::default()
        }
    }
}

impl CacheStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        let mut entries = self.entries.lock();
        if matches!(entries.get(key), Some((_, at)) if is_expired(*at)) {
            entries.remove(key);
        }
        let value = entries.get(key).map(|(value, _)| value.clone());
        self.counters.record(value)
    }

    fn set(&self, key: &str, value: &str, ttl: Option<Duration>) {
        let expires_at = expiry(ttl, self.default_ttl);
        self.entries
            .lock()
            .insert(key.to_string(), (value.to_string(), expires_at));
    }

    fn add(&self, key: &str, value: &str, ttl: Option<Duration>) -> bool {
        let mut entries = self.entries.lock();
        if let Some((_, expires_at)) = entries.get(key) {
            if !is_expired(*expires_at) {
                return false;
            }
        }
        let expires_at = expiry(ttl, self.default_ttl);
        entries.insert(key.to_string(), (value.to_string(), expires_at));
        true
    }

    fn remove(&self, key: &str) -> bool {
        self.entries.lock().remove(key).is_some()
    }

    fn clear(&self) {
        self.entries.lock().clear();
        self.counters.reset();
    }

    fn stats(&self) -> CacheStats {
        self.counters.snapshot(self.entries.lock().len())
    }
}

#[derive(Serialize, Deserialize)]
struct Envelope {
    version: u32,
    key: String,
    expires_at: Option<i64>,
    value: String,
}

/// One JSON file per entry, named by the blake3 hash of its key
#[derive(Debug)]
pub struct DiskStore {
    dir: PathBuf,
    default_ttl: Option<Duration>,
    counters: Counters,
}

impl DiskStore {
    pub fn new(dir: impl Into<PathBuf>, default_ttl: Option<Duration>) -> Self {
        Self {
            dir: dir.into(),
            default_ttl,
            counters: Counters::default(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.dir
            .join(format!("{}.json", blake3::hash(key.as_bytes()).to_hex()))
    }

    fn read(&self, key: &str) -> Result<Option<Envelope>, CacheError> {
        let path = self.entry_path(key);
        let data = match fs::read(&path) {
            Ok(data) => data,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        let envelope: Envelope = serde_json::from_slice(&data)?;
        if envelope.version != CACHE_VERSION || envelope.key != key {
            return Ok(None);
        }
        if is_expired(envelope.expires_at) {
            fs::remove_file(&path)?;
            return Ok(None);
        }
        Ok(Some(envelope))
    }

    fn write(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), CacheError> {
        fs::create_dir_all(&self.dir)?;
        let envelope = Envelope {
            version: CACHE_VERSION,
            key: key.to_string(),
            expires_at: expiry(ttl, self.default_ttl),
            value: value.to_string(),
        };
        fs::write(self.entry_path(key), serde_json::to_vec(&envelope)?)?;
        Ok(())
    }

    fn entry_files(&self) -> Result<Vec<PathBuf>, CacheError> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };
        let mut files = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                files.push(path);
            }
        }
        Ok(files)
    }

    fn soft<T>(&self, what: &str, result: Result<T, CacheError>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(err) => {
                warn!("Cache {} failed in {:?}: {}", what, self.dir, err);
                None
            }
        }
    }
}

impl CacheStore for DiskStore {
    fn get(&self, key: &str) -> Option<String> {
        let envelope = self.soft("read", self.read(key)).flatten();
        self.counters.record(envelope.map(|e| e.value))
    }

    fn set(&self, key: &str, value: &str, ttl: Option<Duration>) {
        self.soft("write", self.write(key, value, ttl));
    }

    fn add(&self, key: &str, value: &str, ttl: Option<Duration>) -> bool {
        if self.soft("read", self.read(key)).flatten().is_some() {
            return false;
        }
        self.soft("write", self.write(key, value, ttl)).is_some()
    }

    fn remove(&self, key: &str) -> bool {
        match fs::remove_file(self.entry_path(key)) {
            Ok(()) => true,
            Err(err) if err.kind() == ErrorKind::NotFound => false,
            Err(err) => {
                warn!("Cache remove failed in {:?}: {}", self.dir, err);
                false
            }
        }
    }

    fn clear(&self) {
        let files = self.soft("clear", self.entry_files()).unwrap_or_default();
        for file in files {
            if let Err(err) = fs::remove_file(&file) {
                warn!("Could not remove cache entry {:?}: {}", file, err);
            }
        }
        self.counters.reset();
    }

    fn stats(&self) -> CacheStats {
        let entries = self
            .soft("scan", self.entry_files())
            .map_or(0, |files| files.len());
        self.counters.snapshot(entries)
    }
}
