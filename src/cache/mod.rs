//! Result cache for classifier verdicts.
//!
//! Entries are keyed by the hash of a [`StructuralFingerprint`] and indexed
//! by `(loop type, access pattern)` bucket for similarity lookups. The cache
//! is an explicitly constructed service: open it before a run, pass it to the
//! pipeline, and `close` it afterwards to flush usage counters to disk.

pub mod fingerprint;
pub mod locks;
pub mod store;

use chrono::Utc;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::OwnedMutexGuard;
use tracing::{debug, info};

use crate::config::CacheConfig;
use crate::core::{ClassifierVerdict, PatternType, Result};
use crate::source::truncate_chars;

pub use fingerprint::{AccessPattern, BucketKey, LoopType, MemoryPattern, StructuralFingerprint};
pub use locks::FingerprintLocks;
pub use store::{short_hash, CachedAnalysis, CACHE_FILE_NAME};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum CacheHitKind {
    Exact,
    Similar { similarity: f64 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct CacheHit {
    pub payload: ClassifierVerdict,
    pub kind: CacheHitKind,
    /// Hash of the entry that answered the lookup
    pub fingerprint: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheStats {
    pub total_entries: usize,
    pub total_usage: u64,
    pub average_usage: f64,
    pub average_age_hours: f64,
    pub exact_hits: u64,
    pub similar_hits: u64,
    pub misses: u64,
    pub stores: u64,
    pub hit_rate: f64,
    pub max_entries: usize,
    pub ttl_hours: u64,
    pub similarity_threshold: f64,
}

#[derive(Debug, Default)]
struct CacheState {
    entries: HashMap<String, CachedAnalysis>,
    index: HashMap<BucketKey, Vec<String>>,
}

impl CacheState {
    fn from_entries(entries: HashMap<String, CachedAnalysis>) -> Self {
        let mut state = Self {
            entries,
            index: HashMap::new(),
        };
        state.rebuild_index();
        state
    }

    fn rebuild_index(&mut self) {
        self.index.clear();
        for (hash, entry) in &self.entries {
            self.index
                .entry(entry.fingerprint.bucket())
                .or_default()
                .push(hash.clone());
        }
    }

    fn remove(&mut self, hash: &str) {
        if let Some(entry) = self.entries.remove(hash) {
            if let Some(bucket) = self.index.get_mut(&entry.fingerprint.bucket()) {
                bucket.retain(|h| h != hash);
            }
        }
    }
}

#[derive(Debug, Default)]
struct Counters {
    exact_hits: AtomicU64,
    similar_hits: AtomicU64,
    misses: AtomicU64,
    stores: AtomicU64,
}

pub struct ResultCache {
    config: CacheConfig,
    /// Durable file; `None` keeps the cache in memory only
    path: Option<PathBuf>,
    state: Mutex<CacheState>,
    /// Held from snapshot to rename so durable writes land in state order.
    /// Taken before `state`, never while holding it.
    write_lock: Mutex<()>,
    locks: FingerprintLocks,
    counters: Counters,
}

impl ResultCache {
    /// Opens the cache described by `config`, loading its durable file.
    /// A disabled cache never hits and never stores.
    pub fn open(config: CacheConfig) -> Self {
        if !config.enabled {
            info!("Result cache disabled");
            return Self::with_state(config, None, CacheState::default());
        }
        let path = config.resolve_directory().join(CACHE_FILE_NAME);
        Self::open_at(config, path)
    }

    /// Opens a cache backed by the file at `path`
    pub fn open_at(config: CacheConfig, path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let loaded = store::load_entries(&path, config.ttl());
        info!(
            entries = loaded.entries.len(),
            skipped = loaded.skipped,
            expired = loaded.expired,
            path = %path.display(),
            "Opened result cache"
        );
        Self::with_state(config, Some(path), CacheState::from_entries(loaded.entries))
    }

    pub fn in_memory(config: CacheConfig) -> Self {
        Self::with_state(config, None, CacheState::default())
    }

    fn with_state(config: CacheConfig, path: Option<PathBuf>, state: CacheState) -> Self {
        Self {
            config,
            path,
            state: Mutex::new(state),
            write_lock: Mutex::new(()),
            locks: FingerprintLocks::new(),
            counters: Counters::default(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Serializes writers for one fingerprint hash
    pub async fn lock(&self, fingerprint: &str) -> OwnedMutexGuard<()> {
        self.locks.acquire(fingerprint).await
    }

    /// Forgets writer locks that nobody holds or waits on
    pub fn release_idle_locks(&self) {
        self.locks.prune();
    }

    /// Writer locks currently tracked
    pub fn lock_count(&self) -> usize {
        self.locks.len()
    }

    pub fn lookup(&self, snippet: &str, pattern: PatternType) -> Option<CacheHit> {
        self.lookup_fingerprint(&StructuralFingerprint::extract(snippet, pattern))
    }

    /// Exact hash hit first, then the most similar unexpired entry in the
    /// same bucket at or above the similarity threshold.
    pub fn lookup_fingerprint(&self, fingerprint: &StructuralFingerprint) -> Option<CacheHit> {
        if !self.config.enabled {
            return None;
        }

        let hash = fingerprint.hash();
        let now = Utc::now();
        let ttl = self.config.ttl();
        let mut state = self.state.lock();

        let exact_expired = state.entries.get(&hash).map(|e| e.is_expired(now, ttl));
        match exact_expired {
            Some(false) => {
                if let Some(entry) = state.entries.get_mut(&hash) {
                    entry.usage_count += 1;
                    self.counters.exact_hits.fetch_add(1, Ordering::Relaxed);
                    debug!("Cache hit (exact): {}", short_hash(&hash));
                    return Some(CacheHit {
                        payload: entry.payload.clone(),
                        kind: CacheHitKind::Exact,
                        fingerprint: hash,
                    });
                }
            }
            Some(true) => state.remove(&hash),
            None => {}
        }

        let best = state
            .index
            .get(&fingerprint.bucket())
            .into_iter()
            .flatten()
            .filter_map(|candidate| {
                let entry = state.entries.get(candidate)?;
                if entry.is_expired(now, ttl) {
                    return None;
                }
                let similarity =
                    fingerprint.similarity(&entry.fingerprint, &self.config.similarity_weights);
                (similarity >= self.config.similarity_threshold).then(|| (candidate.clone(), similarity))
            })
            .max_by(|a, b| a.1.total_cmp(&b.1));

        if let Some((matched, similarity)) = best {
            if let Some(entry) = state.entries.get_mut(&matched) {
                entry.usage_count += 1;
                self.counters.similar_hits.fetch_add(1, Ordering::Relaxed);
                debug!(
                    "Cache hit (similar): {} ~ {} ({:.3})",
                    short_hash(&hash),
                    short_hash(&matched),
                    similarity
                );
                return Some(CacheHit {
                    payload: entry.payload.clone(),
                    kind: CacheHitKind::Similar { similarity },
                    fingerprint: matched,
                });
            }
        }

        self.counters.misses.fetch_add(1, Ordering::Relaxed);
        debug!("Cache miss: {}", short_hash(&hash));
        None
    }

    pub fn store(&self, snippet: &str, pattern: PatternType, payload: ClassifierVerdict) -> Result<String> {
        let fingerprint = StructuralFingerprint::extract(snippet, pattern);
        self.store_fingerprint(fingerprint, snippet, payload)
    }

    /// Inserts or replaces the entry for `fingerprint`, runs capacity cleanup
    /// and rewrites the durable file. Returns the fingerprint hash.
    pub fn store_fingerprint(
        &self,
        fingerprint: StructuralFingerprint,
        snippet: &str,
        payload: ClassifierVerdict,
    ) -> Result<String> {
        let hash = fingerprint.hash();
        if !self.config.enabled {
            return Ok(hash);
        }

        let entry = CachedAnalysis {
            confidence: payload.confidence,
            payload,
            timestamp: Utc::now(),
            usage_count: 1,
            snippet_preview: truncate_chars(snippet, store::SNIPPET_PREVIEW_CHARS),
            fingerprint,
        };

        let _write = self.write_lock.lock();
        let snapshot = {
            let mut state = self.state.lock();
            state.remove(&hash);
            state
                .index
                .entry(entry.fingerprint.bucket())
                .or_default()
                .push(hash.clone());
            state.entries.insert(hash.clone(), entry);
            self.cleanup(&mut state);
            self.path.as_ref().map(|_| state.entries.clone())
        };
        self.counters.stores.fetch_add(1, Ordering::Relaxed);
        debug!("Cached analysis: {}", short_hash(&hash));

        if let (Some(path), Some(entries)) = (&self.path, snapshot) {
            store::write_snapshot(path, &entries)?;
        }
        Ok(hash)
    }

    /// Drops expired entries, then evicts the least used (oldest first on
    /// ties) until the entry count is within capacity.
    fn cleanup(&self, state: &mut CacheState) {
        let now = Utc::now();
        let ttl = self.config.ttl();
        let expired: Vec<String> = state
            .entries
            .iter()
            .filter(|(_, e)| e.is_expired(now, ttl))
            .map(|(h, _)| h.clone())
            .collect();
        for hash in &expired {
            state.remove(hash);
        }

        let excess = state.entries.len().saturating_sub(self.config.max_entries);
        if excess == 0 {
            return;
        }
        let mut ranked: Vec<(u64, chrono::DateTime<Utc>, String)> = state
            .entries
            .iter()
            .map(|(h, e)| (e.usage_count, e.timestamp, h.clone()))
            .collect();
        ranked.sort();
        for (_, _, hash) in ranked.into_iter().take(excess) {
            debug!("Evicted cache entry: {}", short_hash(&hash));
            state.remove(&hash);
        }
        info!("Cache cleanup: removed {} entries", excess + expired.len());
    }

    pub fn stats(&self) -> CacheStats {
        let state = self.state.lock();
        let now = Utc::now();
        let total_entries = state.entries.len();
        let total_usage: u64 = state.entries.values().map(|e| e.usage_count).sum();
        let total_age_hours: f64 = state
            .entries
            .values()
            .map(|e| e.age(now).num_seconds() as f64 / 3600.0)
            .sum();

        let exact_hits = self.counters.exact_hits.load(Ordering::Relaxed);
        let similar_hits = self.counters.similar_hits.load(Ordering::Relaxed);
        let misses = self.counters.misses.load(Ordering::Relaxed);
        let lookups = exact_hits + similar_hits + misses;

        let per_entry = |total: f64| {
            if total_entries == 0 {
                0.0
            } else {
                total / total_entries as f64
            }
        };

        CacheStats {
            total_entries,
            total_usage,
            average_usage: per_entry(total_usage as f64),
            average_age_hours: per_entry(total_age_hours),
            exact_hits,
            similar_hits,
            misses,
            stores: self.counters.stores.load(Ordering::Relaxed),
            hit_rate: if lookups == 0 {
                0.0
            } else {
                (exact_hits + similar_hits) as f64 / lookups as f64
            },
            max_entries: self.config.max_entries,
            ttl_hours: self.config.ttl_hours,
            similarity_threshold: self.config.similarity_threshold,
        }
    }

    /// Removes every entry and the durable file
    pub fn clear(&self) -> Result<()> {
        let _write = self.write_lock.lock();
        {
            let mut state = self.state.lock();
            state.entries.clear();
            state.index.clear();
        }
        self.locks.prune();
        if let Some(path) = &self.path {
            store::remove_snapshot(path)?;
        }
        info!("Cache cleared");
        Ok(())
    }

    /// Writes current entries, including usage counts, to the durable file
    pub fn flush(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let _write = self.write_lock.lock();
        let entries = self.state.lock().entries.clone();
        store::write_snapshot(path, &entries)
    }

    pub fn close(self) -> Result<()> {
        self.flush()
    }

    #[cfg(test)]
    fn age_entries(&self, hours: i64) {
        let mut state = self.state.lock();
        for entry in state.entries.values_mut() {
            entry.timestamp -= chrono::Duration::hours(hours);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Classification, VerdictSource};
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    const VECTOR_ADD: &str = "for (int i = 0; i < n; i++) { c[i] = a[i] + b[i]; }";

    fn verdict(confidence: f64) -> ClassifierVerdict {
        ClassifierVerdict {
            classification: Classification::SafeParallel,
            reasoning: "independent iterations".to_string(),
            confidence,
            transformations: vec!["add simd clause".to_string()],
            tests_recommended: Vec::new(),
            issue_type: Default::default(),
            source: VerdictSource::Classifier,
        }
    }

    fn memory_cache() -> ResultCache {
        ResultCache::in_memory(CacheConfig::default())
    }

    #[test]
    fn test_store_then_lookup_returns_payload() {
        let cache = memory_cache();
        let payload = verdict(0.9);
        cache.store(VECTOR_ADD, PatternType::Vectorizable, payload.clone()).unwrap();

        let hit = cache.lookup(VECTOR_ADD, PatternType::Vectorizable).unwrap();
        assert_eq!(hit.payload, payload);
        assert_eq!(hit.kind, CacheHitKind::Exact);
    }

    #[test]
    fn test_similar_hit_within_bucket() {
        let cache = memory_cache();
        cache.store(VECTOR_ADD, PatternType::Vectorizable, verdict(0.9)).unwrap();

        let hit = cache
            .lookup(
                "for (int i = 0; i < m; i++) { d[i] = x[i] + y[i] + z[i]; }",
                PatternType::Vectorizable,
            )
            .unwrap();
        assert!(matches!(hit.kind, CacheHitKind::Similar { similarity } if similarity >= 0.85));
        let stats = cache.stats();
        assert_eq!(stats.similar_hits, 1);
        assert_eq!(stats.total_usage, 2);
    }

    #[test]
    fn test_different_bucket_misses() {
        let cache = memory_cache();
        cache.store(VECTOR_ADD, PatternType::Vectorizable, verdict(0.9)).unwrap();
        let miss = cache.lookup("while (p) { p = p->next; }", PatternType::Vectorizable);
        assert!(miss.is_none());
        assert_eq!(cache.stats().misses, 1);
    }

    #[test]
    fn test_expired_entries_are_not_returned() {
        let cache = memory_cache();
        cache.store(VECTOR_ADD, PatternType::Vectorizable, verdict(0.9)).unwrap();
        cache.age_entries(24 * 7);
        assert!(cache.lookup(VECTOR_ADD, PatternType::Vectorizable).is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_capacity_evicts_least_used() {
        let cache = ResultCache::in_memory(CacheConfig {
            max_entries: 2,
            ..Default::default()
        });
        cache.store(VECTOR_ADD, PatternType::Vectorizable, verdict(0.9)).unwrap();
        cache.store(VECTOR_ADD, PatternType::SimpleLoop, verdict(0.8)).unwrap();
        // bump the first entry so the second is least used
        cache.lookup(VECTOR_ADD, PatternType::Vectorizable).unwrap();
        cache.store(VECTOR_ADD, PatternType::Reduction, verdict(0.7)).unwrap();

        assert_eq!(cache.len(), 2);
        assert!(cache.lookup(VECTOR_ADD, PatternType::Vectorizable).is_some());
        assert!(cache.lookup(VECTOR_ADD, PatternType::SimpleLoop).is_none());
    }

    #[test]
    fn test_disabled_cache_never_hits() {
        let cache = ResultCache::open(CacheConfig {
            enabled: false,
            ..Default::default()
        });
        cache.store(VECTOR_ADD, PatternType::Vectorizable, verdict(0.9)).unwrap();
        assert!(cache.lookup(VECTOR_ADD, PatternType::Vectorizable).is_none());
        assert!(cache.path().is_none());
    }

    #[test]
    fn test_durable_file_survives_reopen() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(CACHE_FILE_NAME);
        let cache = ResultCache::open_at(CacheConfig::default(), &path);
        cache.store(VECTOR_ADD, PatternType::Vectorizable, verdict(0.9)).unwrap();
        cache.lookup(VECTOR_ADD, PatternType::Vectorizable).unwrap();
        cache.close().unwrap();

        let reopened = ResultCache::open_at(CacheConfig::default(), &path);
        assert_eq!(reopened.len(), 1);
        assert_eq!(reopened.stats().total_usage, 2);
    }

    #[test]
    fn test_clear_removes_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(CACHE_FILE_NAME);
        let cache = ResultCache::open_at(CacheConfig::default(), &path);
        cache.store(VECTOR_ADD, PatternType::Vectorizable, verdict(0.9)).unwrap();
        assert!(path.exists());

        cache.clear().unwrap();
        assert!(cache.is_empty());
        assert!(!path.exists());
    }

    #[test]
    fn test_stats_hit_rate() {
        let cache = memory_cache();
        assert_eq!(cache.stats().hit_rate, 0.0);
        cache.store(VECTOR_ADD, PatternType::Vectorizable, verdict(0.9)).unwrap();
        cache.lookup(VECTOR_ADD, PatternType::Vectorizable);
        cache.lookup("do { x--; } while (x);", PatternType::Risky);
        let stats = cache.stats();
        assert_eq!(stats.exact_hits, 1);
        assert_eq!(stats.misses, 1);
        assert!((stats.hit_rate - 0.5).abs() < 1e-9);
        assert_eq!(stats.max_entries, 1000);
    }
}
