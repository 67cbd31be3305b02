//! Classification cache: remembers which LP addresses are pairs and which are plain tokens.
//!
//! The classifier only ever stores terminal answers, so a transient RPC failure cannot
//! poison an entry. Stores are shared across every staking contract of the process.

use crate::metrics;
use crate::types::TokenType;
use dashmap::DashMap;
use ethers::prelude::Address;
use log::{debug, warn};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

/// Key-value store for classification decisions. Absence is always a valid answer.
pub trait ClassificationStore: Send + Sync {
    fn get(&self, address: &Address) -> Option<TokenType>;
    fn set(&self, address: Address, token_type: TokenType);
}

#[derive(Default)]
pub struct CacheMetrics {
    hits: AtomicU64,
    misses: AtomicU64,
    writes: AtomicU64,
}

impl CacheMetrics {
    fn record(&self, hit: bool) {
        if hit {
            self.hits.fetch_add(1, Ordering::Relaxed);
            metrics::increment_cache_hit("classification");
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
            metrics::increment_cache_miss("classification");
        }
    }

    fn snapshot(&self, cache_size: usize) -> CacheMetricsSnapshot {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;

        CacheMetricsSnapshot {
            hits,
            misses,
            writes: self.writes.load(Ordering::Relaxed),
            hit_rate: if total > 0 { hits as f64 / total as f64 } else { 0.0 },
            cache_size,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CacheMetricsSnapshot {
    pub hits: u64,
    pub misses: u64,
    pub writes: u64,
    pub hit_rate: f64,
    pub cache_size: usize,
}

/// Process-local store; what tests and short-lived runs use.
#[derive(Default)]
pub struct InMemoryClassificationStore {
    cache: DashMap<Address, TokenType>,
    metrics: CacheMetrics,
}

impl InMemoryClassificationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn metrics(&self) -> CacheMetricsSnapshot {
        self.metrics.snapshot(self.cache.len())
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    pub fn clear(&self) {
        self.cache.clear();
    }
}

impl ClassificationStore for InMemoryClassificationStore {
    fn get(&self, address: &Address) -> Option<TokenType> {
        let found = self
            .cache
            .get(address)
            .map(|entry| *entry.value())
            .filter(TokenType::is_cacheable);
        self.metrics.record(found.is_some());
        found
    }

    fn set(&self, address: Address, token_type: TokenType) {
        if !token_type.is_cacheable() {
            return;
        }
        self.cache.insert(address, token_type);
        self.metrics.writes.fetch_add(1, Ordering::Relaxed);
    }
}

/// Durable store backed by a JSON object `{ "0x…": "pair_asset", … }`.
///
/// The whole map is loaded at open and rewritten on every new decision (temp file +
/// rename). Decisions are rare and the file stays small, so write-through is enough.
pub struct FileClassificationStore {
    path: PathBuf,
    cache: DashMap<Address, TokenType>,
    metrics: CacheMetrics,
    write_lock: Mutex<()>,
}

impl FileClassificationStore {
    /// Opens (or starts) the store at `path`. A missing file is an empty cache; an
    /// unreadable or corrupt one is logged and ignored.
    pub fn open(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let cache = DashMap::new();

        match fs::read_to_string(&path) {
            Ok(raw) => match serde_json::from_str::<BTreeMap<Address, TokenType>>(&raw) {
                Ok(entries) => {
                    for (address, token_type) in entries {
                        if token_type.is_cacheable() {
                            cache.insert(address, token_type);
                        }
                    }
                    debug!("Loaded {} classification entries from {}", cache.len(), path.display());
                }
                Err(e) => warn!("Ignoring corrupt classification cache {}: {}", path.display(), e),
            },
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!("Cannot read classification cache {}: {}", path.display(), e),
        }

        Self {
            path,
            cache,
            metrics: CacheMetrics::default(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    pub fn metrics(&self) -> CacheMetricsSnapshot {
        self.metrics.snapshot(self.cache.len())
    }

    fn persist(&self) -> io::Result<()> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "classification cache lock poisoned"))?;

        let snapshot: BTreeMap<Address, TokenType> = self
            .cache
            .iter()
            .map(|entry| (*entry.key(), *entry.value()))
            .collect();
        let json = serde_json::to_string_pretty(&snapshot)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &self.path)
    }
}

impl ClassificationStore for FileClassificationStore {
    fn get(&self, address: &Address) -> Option<TokenType> {
        let found = self.cache.get(address).map(|entry| *entry.value());
        self.metrics.record(found.is_some());
        found
    }

    fn set(&self, address: Address, token_type: TokenType) {
        if !token_type.is_cacheable() {
            return;
        }
        if self.cache.insert(address, token_type) == Some(token_type) {
            return;
        }
        self.metrics.writes.fetch_add(1, Ordering::Relaxed);
        if let Err(e) = self.persist() {
            // The in-memory entry still serves this process.
            warn!("Failed to persist classification cache {}: {}", self.path.display(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(n: u64) -> Address {
        Address::from_low_u64_be(n)
    }

    #[test]
    fn in_memory_store_never_keeps_unclassified() {
        let store = InMemoryClassificationStore::new();
        store.set(addr(1), TokenType::Unclassified);
        assert_eq!(store.get(&addr(1)), None);
        assert!(store.is_empty());

        store.set(addr(2), TokenType::PairAsset);
        assert_eq!(store.get(&addr(2)), Some(TokenType::PairAsset));

        let snapshot = store.metrics();
        assert_eq!(snapshot.hits, 1);
        assert_eq!(snapshot.misses, 1);
        assert_eq!(snapshot.writes, 1);
        assert_eq!(snapshot.cache_size, 1);
    }

    #[test]
    fn file_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("classification.json");

        {
            let store = FileClassificationStore::open(&path);
            assert!(store.is_empty());
            store.set(addr(10), TokenType::PairAsset);
            store.set(addr(11), TokenType::SingleAsset);
            store.set(addr(12), TokenType::Unclassified);
        }

        let reopened = FileClassificationStore::open(&path);
        assert_eq!(reopened.len(), 2);
        assert_eq!(reopened.get(&addr(10)), Some(TokenType::PairAsset));
        assert_eq!(reopened.get(&addr(11)), Some(TokenType::SingleAsset));
        assert_eq!(reopened.get(&addr(12)), None);
    }

    #[test]
    fn file_store_keys_are_case_insensitive() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("classification.json");
        fs::write(
            &path,
            r#"{ "0x21BE370D5312F44CB42CE377BC9B8A0CEF1A4C83": "single_asset" }"#,
        )
        .unwrap();

        let store = FileClassificationStore::open(&path);
        let lower: Address = "0x21be370d5312f44cb42ce377bc9b8a0cef1a4c83".parse().unwrap();
        assert_eq!(store.get(&lower), Some(TokenType::SingleAsset));
    }

    #[test]
    fn corrupt_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("classification.json");
        fs::write(&path, "not json").unwrap();

        let store = FileClassificationStore::open(&path);
        assert!(store.is_empty());
        store.set(addr(3), TokenType::SingleAsset);
        assert_eq!(FileClassificationStore::open(&path).len(), 1);
    }
}
