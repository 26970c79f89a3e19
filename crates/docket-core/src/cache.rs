//! Content-addressed cache of extraction results.
//!
//! Entries are keyed by the SHA-256 of the full file bytes, expire after a
//! TTL and are evicted least-hit, oldest-first once the cache grows past its
//! limit. Every write persists the whole cache to a JSON file while the cache
//! lock is held.

use std::collections::HashMap;
use std::fmt;
use std::fs::File;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::error::CacheError;
use crate::lock;
use crate::models::config::CacheConfig;
use crate::models::ExtractionResult;

/// Bytes read per hashing step.
pub const HASH_CHUNK_SIZE: usize = 64 * 1024;

/// Share of `max_entries` kept after an eviction pass.
const EVICT_TO: f64 = 0.8;

/// Hex SHA-256 digest of a document's bytes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentHash(String);

impl ContentHash {
    /// Hash a byte stream in fixed-size chunks.
    pub fn from_reader<R: Read>(mut reader: R) -> io::Result<Self> {
        let mut hasher = Sha256::new();
        let mut buf = vec![0u8; HASH_CHUNK_SIZE];
        loop {
            let n = match reader.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            };
            hasher.update(&buf[..n]);
        }
        Ok(Self(hex::encode(hasher.finalize())))
    }

    /// Hash a file's content.
    pub fn from_file(path: &Path) -> io::Result<Self> {
        Self::from_reader(File::open(path)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self(hex::encode(Sha256::digest(bytes)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Time source in epoch seconds.
pub trait Clock: Send + Sync {
    fn now(&self) -> f64;
}

/// Wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> f64 {
        Utc::now().timestamp_millis() as f64 / 1000.0
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CacheEntry {
    result: ExtractionResult,
    created_at: f64,
    hits: u64,
}

/// Snapshot of cache counters.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub max_entries: usize,
    pub total_hits: u64,
    pub ttl_hours: f64,
    pub cache_file: Option<PathBuf>,
}

/// Thread-safe result cache with optional file persistence.
pub struct ResultCache {
    entries: Mutex<HashMap<ContentHash, CacheEntry>>,
    file: Option<PathBuf>,
    max_entries: usize,
    ttl_secs: f64,
    clock: Arc<dyn Clock>,
}

impl ResultCache {
    /// Open the cache described by `config`, loading its file if present.
    pub fn new(config: &CacheConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// A cache that is never written to disk.
    pub fn in_memory(max_entries: usize, ttl: Duration) -> Self {
        Self::build(None, max_entries, ttl, Arc::new(SystemClock))
    }

    pub fn with_clock(config: &CacheConfig, clock: Arc<dyn Clock>) -> Self {
        Self::build(config.file.clone(), config.max_entries, config.ttl(), clock)
    }

    fn build(file: Option<PathBuf>, max_entries: usize, ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        let ttl_secs = ttl.as_secs_f64();
        let entries = match &file {
            Some(path) => load(path, ttl_secs, clock.now()),
            None => HashMap::new(),
        };

        Self {
            entries: Mutex::new(entries),
            file,
            max_entries: max_entries.max(1),
            ttl_secs,
            clock,
        }
    }

    /// Cached result for `key`, unless missing or expired.
    ///
    /// Expired entries are removed. A hit increments the entry's hit counter.
    pub fn get(&self, key: &ContentHash) -> Option<ExtractionResult> {
        let now = self.clock.now();
        let mut entries = lock(&self.entries);

        let expired = now - entries.get(key)?.created_at > self.ttl_secs;
        if expired {
            debug!("Cache entry {} expired", key);
            entries.remove(key);
            return None;
        }

        let entry = entries.get_mut(key)?;
        entry.hits += 1;
        Some(entry.result.clone())
    }

    /// Store `result` under `key`, evict if over the limit and persist.
    pub fn set(&self, key: ContentHash, result: &ExtractionResult) -> Result<(), CacheError> {
        let entry = CacheEntry {
            result: result.clone(),
            created_at: self.clock.now(),
            hits: 0,
        };

        let mut entries = lock(&self.entries);
        entries.insert(key, entry);
        evict(&mut entries, self.max_entries);
        self.persist(&entries)
    }

    /// Drop the entry for `key`. Returns whether one existed.
    pub fn invalidate(&self, key: &ContentHash) -> Result<bool, CacheError> {
        let mut entries = lock(&self.entries);
        if entries.remove(key).is_none() {
            return Ok(false);
        }
        self.persist(&entries)?;
        Ok(true)
    }

    /// Remove every entry.
    pub fn clear(&self) -> Result<(), CacheError> {
        let mut entries = lock(&self.entries);
        entries.clear();
        self.persist(&entries)?;
        info!("Cache cleared");
        Ok(())
    }

    pub fn stats(&self) -> CacheStats {
        let entries = lock(&self.entries);
        CacheStats {
            entries: entries.len(),
            max_entries: self.max_entries,
            total_hits: entries.values().map(|e| e.hits).sum(),
            ttl_hours: self.ttl_secs / 3600.0,
            cache_file: self.file.clone(),
        }
    }

    pub fn len(&self) -> usize {
        lock(&self.entries).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn persist(&self, entries: &HashMap<ContentHash, CacheEntry>) -> Result<(), CacheError> {
        let Some(path) = &self.file else {
            return Ok(());
        };
        let io_err = |source| CacheError::Io {
            path: path.clone(),
            source,
        };

        let dir = match path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(dir).map_err(io_err)?;

        let data = serde_json::to_vec(entries)?;
        let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(io_err)?;
        tmp.write_all(&data).map_err(io_err)?;
        tmp.persist(path).map_err(|e| io_err(e.error))?;
        Ok(())
    }
}

/// Remove least-hit, oldest entries until at most 80 % of `max` remain.
///
/// Does nothing unless the cache holds more than `max` entries.
fn evict(entries: &mut HashMap<ContentHash, CacheEntry>, max: usize) {
    if entries.len() <= max {
        return;
    }

    let keep = ((max as f64) * EVICT_TO).floor() as usize;
    let mut ranked: Vec<(u64, f64, ContentHash)> = entries
        .iter()
        .map(|(key, e)| (e.hits, e.created_at, key.clone()))
        .collect();
    ranked.sort_by(|a, b| a.0.cmp(&b.0).then(a.1.total_cmp(&b.1)));

    let remove = entries.len() - keep;
    for (_, _, key) in ranked.into_iter().take(remove) {
        entries.remove(&key);
    }
    debug!("Evicted {} cache entries, {} left", remove, entries.len());
}

/// Read the cache file, dropping expired entries.
///
/// A missing file is an empty cache; an unreadable or corrupt one is too,
/// with a warning.
fn load(path: &Path, ttl_secs: f64, now: f64) -> HashMap<ContentHash, CacheEntry> {
    let data = match std::fs::read(path) {
        Ok(data) => data,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return HashMap::new(),
        Err(e) => {
            warn!("Cannot read cache file {}: {}, starting empty", path.display(), e);
            return HashMap::new();
        }
    };

    let mut entries: HashMap<ContentHash, CacheEntry> = match serde_json::from_slice(&data) {
        Ok(entries) => entries,
        Err(e) => {
            warn!("Corrupt cache file {}: {}, starting empty", path.display(), e);
            return HashMap::new();
        }
    };

    let total = entries.len();
    entries.retain(|_, e| now - e.created_at <= ttl_secs);
    info!(
        "Loaded {} cache entries from {} ({} expired)",
        entries.len(),
        path.display(),
        total - entries.len()
    );
    entries
}
