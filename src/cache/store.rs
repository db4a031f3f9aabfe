//! Durable JSON form of the result cache.
//!
//! The file is a single object mapping fingerprint hashes to records. Every
//! write replaces the whole document through a temp file and a rename so a
//! crash mid-write leaves the previous snapshot intact.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, warn};

use super::fingerprint::StructuralFingerprint;
use crate::core::{ClassifierVerdict, Error, Result};

pub const CACHE_FILE_NAME: &str = "pattern_cache.json";

/// Characters of the originating snippet kept for inspection
pub const SNIPPET_PREVIEW_CHARS: usize = 200;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedAnalysis {
    pub payload: ClassifierVerdict,
    pub timestamp: DateTime<Utc>,
    pub usage_count: u64,
    pub snippet_preview: String,
    pub confidence: f64,
    pub fingerprint: StructuralFingerprint,
}

impl CachedAnalysis {
    pub fn age(&self, now: DateTime<Utc>) -> chrono::Duration {
        now.signed_duration_since(self.timestamp)
    }

    pub fn is_expired(&self, now: DateTime<Utc>, ttl: std::time::Duration) -> bool {
        match chrono::Duration::from_std(ttl) {
            Ok(ttl) => self.age(now) >= ttl,
            Err(_) => false,
        }
    }
}

#[derive(Debug, Default)]
pub struct LoadedEntries {
    pub entries: HashMap<String, CachedAnalysis>,
    pub skipped: usize,
    pub expired: usize,
}

/// Reads the cache document. A missing file is an empty cache; an unreadable
/// or malformed document is logged and treated as empty; individual records
/// that fail to decode are skipped.
pub fn load_entries(path: &Path, ttl: std::time::Duration) -> LoadedEntries {
    let mut loaded = LoadedEntries::default();

    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return loaded,
        Err(e) => {
            warn!("Failed to read cache file {}: {}", path.display(), e);
            return loaded;
        }
    };

    let document: serde_json::Map<String, serde_json::Value> =
        match serde_json::from_str(&content) {
            Ok(document) => document,
            Err(e) => {
                warn!("Ignoring corrupt cache file {}: {}", path.display(), e);
                return loaded;
            }
        };

    let now = Utc::now();
    for (hash, value) in document {
        match serde_json::from_value::<CachedAnalysis>(value) {
            Ok(entry) if entry.is_expired(now, ttl) => loaded.expired += 1,
            Ok(entry) => {
                loaded.entries.insert(hash, entry);
            }
            Err(e) => {
                warn!("Skipping cache entry {}: {}", short_hash(&hash), e);
                loaded.skipped += 1;
            }
        }
    }

    debug!(
        loaded = loaded.entries.len(),
        skipped = loaded.skipped,
        expired = loaded.expired,
        "Loaded cache file"
    );
    loaded
}

/// Replaces the cache document with `entries`
pub fn write_snapshot(path: &Path, entries: &HashMap<String, CachedAnalysis>) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| Error::io_at(parent, e))?;
    }

    let content = serde_json::to_string_pretty(entries)?;
    let temp_path = temp_path_for(path);
    fs::write(&temp_path, content).map_err(|e| Error::io_at(&temp_path, e))?;
    if let Err(e) = fs::rename(&temp_path, path) {
        let _ = fs::remove_file(&temp_path);
        return Err(Error::io_at(path, e));
    }
    Ok(())
}

pub fn remove_snapshot(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(Error::io_at(path, e)),
    }
}

/// Collision-free sibling path for atomic writes
fn temp_path_for(target: &Path) -> PathBuf {
    static COUNTER: AtomicU64 = AtomicU64::new(0);

    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let counter = COUNTER.fetch_add(1, Ordering::SeqCst);
    let name = format!(
        "{}.tmp.{}.{}.{}",
        target
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(CACHE_FILE_NAME),
        std::process::id(),
        timestamp,
        counter
    );
    target.with_file_name(name)
}

/// First eight hex characters, used in log lines
pub fn short_hash(hash: &str) -> &str {
    hash.get(..8).unwrap_or(hash)
}
