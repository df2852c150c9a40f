//! Persistent per-file analysis cache.
//!
//! Entries are keyed by (analyzer id, analyzer version, content hash), so a
//! hit requires both content identity and analyzer version to match:
//! editing a file invalidates only its own entries, and upgrading one
//! analyzer invalidates that analyzer's entries without touching the rest.
//!
//! The store is one JSON file per scan root. Writes are batched in memory
//! and flushed once at end of run by writing a temp file and atomically
//! renaming it over the old store, so a crash mid-run loses only the
//! current run's new entries.

use dashmap::{DashMap, DashSet};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use crate::error::EngineError;
use crate::index::SourceFile;

const STORE_SCHEMA_VERSION: u32 = 1;
/// Pending entries flushed early when the cache is in write-through mode.
const WRITE_THROUGH_BATCH: usize = 256;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub hash: String,
    pub mtime: i64,
    pub size: u64,
    /// Logical access clock, monotonically increasing; drives LRU eviction.
    pub last_accessed: u64,
    pub analyzer_id: String,
    pub analyzer_version: u32,
    pub result_blob: serde_json::Value,
}

#[derive(Debug, Serialize, Deserialize)]
struct StoreFile {
    version: u32,
    clock: u64,
    entries: std::collections::HashMap<String, CacheEntry>,
}

pub struct AnalyzerCache {
    store_path: PathBuf,
    entries: DashMap<String, CacheEntry>,
    /// Keys looked up or stored during the current run; exempt from
    /// eviction and retained when memory is shed.
    touched: DashSet<String>,
    clock: AtomicU64,
    max_entries: usize,
    write_through: AtomicBool,
    unflushed: AtomicU64,
}

impl AnalyzerCache {
    /// Open the store for `root` under `cache_dir`. A corrupt store is a
    /// recoverable degradation: the error is returned alongside an empty
    /// cache so the orchestrator can surface it as a finding.
    pub fn open(
        cache_dir: &Path,
        root: &Path,
        max_entries: usize,
    ) -> (Self, Option<EngineError>) {
        let store_path = cache_dir.join(store_file_name(root));
        let mut degraded = None;

        let (map, clock) = match std::fs::read_to_string(&store_path) {
            Ok(text) => match serde_json::from_str::<StoreFile>(&text) {
                Ok(store) if store.version == STORE_SCHEMA_VERSION => {
                    let map = DashMap::new();
                    for (k, v) in store.entries {
                        map.insert(k, v);
                    }
                    (map, store.clock)
                }
                Ok(store) => {
                    tracing::warn!(
                        found = store.version,
                        expected = STORE_SCHEMA_VERSION,
                        "cache schema version mismatch, starting empty"
                    );
                    (DashMap::new(), 0)
                }
                Err(e) => {
                    degraded = Some(EngineError::Cache(format!(
                        "corrupt store {}: {e}",
                        store_path.display()
                    )));
                    (DashMap::new(), 0)
                }
            },
            Err(_) => (DashMap::new(), 0),
        };

        (
            Self {
                store_path,
                entries: map,
                touched: DashSet::new(),
                clock: AtomicU64::new(clock),
                max_entries,
                write_through: AtomicBool::new(false),
                unflushed: AtomicU64::new(0),
            },
            degraded,
        )
    }

    fn key(hash: &str, analyzer_id: &str, analyzer_version: u32) -> String {
        format!("{analyzer_id}:{analyzer_version}:{hash}")
    }

    /// Lock-free snapshot read. A hit requires content hash AND analyzer
    /// version to match, both of which are part of the key.
    pub fn lookup(
        &self,
        file: &SourceFile,
        analyzer_id: &str,
        analyzer_version: u32,
    ) -> Option<serde_json::Value> {
        let key = Self::key(&file.hash, analyzer_id, analyzer_version);
        let tick = self.clock.fetch_add(1, Ordering::Relaxed) + 1;
        let mut entry = self.entries.get_mut(&key)?;
        entry.last_accessed = tick;
        self.touched.insert(key);
        Some(entry.result_blob.clone())
    }

    pub fn lookup_as<T: serde::de::DeserializeOwned>(
        &self,
        file: &SourceFile,
        analyzer_id: &str,
        analyzer_version: u32,
    ) -> Option<T> {
        let blob = self.lookup(file, analyzer_id, analyzer_version)?;
        serde_json::from_value(blob).ok()
    }

    /// Single-writer-at-a-time per key is guaranteed by the sharded map.
    pub fn store(
        &self,
        file: &SourceFile,
        analyzer_id: &str,
        analyzer_version: u32,
        result: serde_json::Value,
    ) {
        let key = Self::key(&file.hash, analyzer_id, analyzer_version);
        let tick = self.clock.fetch_add(1, Ordering::Relaxed) + 1;
        self.entries.insert(
            key.clone(),
            CacheEntry {
                hash: file.hash.clone(),
                mtime: file.mtime,
                size: file.size,
                last_accessed: tick,
                analyzer_id: analyzer_id.to_string(),
                analyzer_version,
                result_blob: result,
            },
        );
        self.touched.insert(key);

        if self.write_through.load(Ordering::Relaxed) {
            let pending = self.unflushed.fetch_add(1, Ordering::Relaxed) + 1;
            if pending as usize >= WRITE_THROUGH_BATCH {
                self.unflushed.store(0, Ordering::Relaxed);
                if let Err(e) = self.flush() {
                    tracing::warn!("write-through flush failed: {e}");
                }
            }
        }
    }

    pub fn store_serialized<T: Serialize>(
        &self,
        file: &SourceFile,
        analyzer_id: &str,
        analyzer_version: u32,
        result: &T,
    ) {
        match serde_json::to_value(result) {
            Ok(blob) => self.store(file, analyzer_id, analyzer_version, blob),
            Err(e) => tracing::warn!(analyzer = analyzer_id, "uncacheable result: {e}"),
        }
    }

    /// Shed the in-memory working set under memory pressure: flush to disk,
    /// drop everything not touched this run, and flip to write-through.
    pub fn shed_memory(&self) {
        if let Err(e) = self.flush() {
            tracing::warn!("flush during memory shed failed: {e}");
        }
        self.entries.retain(|k, _| self.touched.contains(k));
        self.write_through.store(true, Ordering::Relaxed);
        tracing::info!(retained = self.entries.len(), "cache shed to write-through mode");
    }

    pub fn is_write_through(&self) -> bool {
        self.write_through.load(Ordering::Relaxed)
    }

    /// Evict least-recently-used entries beyond the bound, then write the
    /// store atomically. Entries touched this run are never evicted.
    pub fn flush(&self) -> Result<(), EngineError> {
        if self.entries.len() > self.max_entries {
            let mut evictable: Vec<(String, u64)> = self
                .entries
                .iter()
                .filter(|e| !self.touched.contains(e.key()))
                .map(|e| (e.key().clone(), e.value().last_accessed))
                .collect();
            evictable.sort_by_key(|(_, accessed)| *accessed);
            let excess = self.entries.len().saturating_sub(self.max_entries);
            for (key, _) in evictable.into_iter().take(excess) {
                self.entries.remove(&key);
            }
        }

        let store = StoreFile {
            version: STORE_SCHEMA_VERSION,
            clock: self.clock.load(Ordering::Relaxed),
            entries: self
                .entries
                .iter()
                .map(|e| (e.key().clone(), e.value().clone()))
                .collect(),
        };

        if let Some(parent) = self.store_path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| EngineError::Cache(format!("cannot create cache dir: {e}")))?;
        }
        let tmp_path = self.store_path.with_extension("json.tmp");
        let text = serde_json::to_string(&store)
            .map_err(|e| EngineError::Cache(format!("serialize failed: {e}")))?;
        std::fs::write(&tmp_path, text)
            .map_err(|e| EngineError::Cache(format!("write failed: {e}")))?;
        std::fs::rename(&tmp_path, &self.store_path)
            .map_err(|e| EngineError::Cache(format!("rename failed: {e}")))?;
        Ok(())
    }

    #[cfg(test)]
    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }
}

fn store_file_name(root: &Path) -> String {
    let canonical = root
        .canonicalize()
        .unwrap_or_else(|_| root.to_path_buf());
    let digest = Sha256::digest(canonical.to_string_lossy().as_bytes());
    let hex = format!("{digest:x}");
    format!("store-{}.json", &hex[..16])
}
