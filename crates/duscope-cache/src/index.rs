//! Cache index: one entry per cached scan root.

use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use duscope_core::PathKey;
use serde::{Deserialize, Serialize};

use crate::error::CacheError;

/// Current index format version.
pub const INDEX_VERSION: u32 = 1;

/// File name of the index inside the cache directory.
pub const INDEX_FILE: &str = "index.json";

/// Metadata about one cached scan.
///
/// The totals mirror the payload's root node so listings can show a
/// cached size without reading the payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub path: PathBuf,
    pub cached_at: DateTime<Utc>,
    pub size: u64,
    pub file_count: u64,
    pub folder_count: u64,
    /// Payload file name, relative to the cache directory.
    pub file_name: String,
}

impl CacheEntry {
    /// Comparison key of the cached root.
    pub fn key(&self) -> PathKey {
        PathKey::new(&self.path)
    }

    /// Returns `true` once the entry is older than `expiration` at `now`.
    pub fn is_expired(&self, now: DateTime<Utc>, expiration: Duration) -> bool {
        match chrono::Duration::from_std(expiration) {
            Ok(window) => now.signed_duration_since(self.cached_at) > window,
            Err(_) => false,
        }
    }
}

/// Payload file name for a root: a BLAKE3 prefix of its normalized path.
pub fn payload_name(key: &PathKey, prefix_len: usize) -> String {
    let hash = blake3::hash(key.as_str().as_bytes());
    let hex = hash.to_hex();
    let len = prefix_len.clamp(8, hex.len());
    format!("{}.json", &hex.as_str()[..len])
}

/// Returns `true` if `file_name` has the shape of a payload name: 8 to 64
/// lowercase hex digits followed by `.json`.
pub fn is_payload_name(file_name: &str) -> bool {
    file_name.strip_suffix(".json").is_some_and(|stem| {
        (8..=64).contains(&stem.len())
            && stem.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
    })
}

#[derive(Serialize, Deserialize)]
struct IndexFile {
    version: u32,
    entries: Vec<CacheEntry>,
}

/// Concurrent in-memory view of the index file.
#[derive(Debug, Default)]
pub struct CacheIndex {
    entries: DashMap<PathKey, CacheEntry>,
}

impl CacheIndex {
    /// Create an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the index file at `path`.
    pub fn load(path: &Path) -> Result<Self, CacheError> {
        let bytes = fs::read(path).map_err(|e| CacheError::io(path, e))?;
        let file: IndexFile =
            serde_json::from_slice(&bytes).map_err(|e| CacheError::json(path, e))?;
        if file.version != INDEX_VERSION {
            return Err(CacheError::Version {
                found: file.version,
                expected: INDEX_VERSION,
            });
        }

        let entries = DashMap::with_capacity(file.entries.len());
        for entry in file.entries {
            if entry.file_name.contains(['/', '\\']) || entry.file_name.is_empty() {
                tracing::warn!(path = %entry.path.display(), "Skipping index entry with bad file name");
                continue;
            }
            entries.insert(entry.key(), entry);
        }
        Ok(Self { entries })
    }

    /// Write the index to `path` through a temporary file in the same
    /// directory, so readers never see a half-written index.
    pub fn save(&self, path: &Path) -> Result<(), CacheError> {
        let dir = path.parent().unwrap_or_else(|| Path::new("."));
        let file = IndexFile {
            version: INDEX_VERSION,
            entries: self.entries(),
        };

        let temp = tempfile::NamedTempFile::new_in(dir).map_err(|e| CacheError::io(dir, e))?;
        {
            let mut writer = BufWriter::new(temp.as_file());
            serde_json::to_writer_pretty(&mut writer, &file)
                .map_err(|e| CacheError::json(path, e))?;
            writer.flush().map_err(|e| CacheError::io(path, e))?;
        }
        temp.persist(path).map_err(|e| CacheError::io(path, e.error))?;
        Ok(())
    }

    /// Entry for exactly `key`.
    pub fn get(&self, key: &PathKey) -> Option<CacheEntry> {
        self.entries.get(key).map(|e| e.value().clone())
    }

    /// Insert or replace the entry for its path.
    pub fn insert(&self, entry: CacheEntry) {
        self.entries.insert(entry.key(), entry);
    }

    /// Remove the entry for `key`, returning it.
    pub fn remove(&self, key: &PathKey) -> Option<CacheEntry> {
        self.entries.remove(key).map(|(_, entry)| entry)
    }

    /// Entries whose root strictly contains `key`, deepest first.
    pub fn ancestors_of(&self, key: &PathKey) -> Vec<CacheEntry> {
        let mut found: Vec<CacheEntry> = self
            .entries
            .iter()
            .filter(|e| e.key().is_ancestor_of(key))
            .map(|e| e.value().clone())
            .collect();
        found.sort_by_key(|e| std::cmp::Reverse(e.key().as_str().len()));
        found
    }

    /// All entries, ordered by path.
    pub fn entries(&self) -> Vec<CacheEntry> {
        let mut all: Vec<CacheEntry> = self.entries.iter().map(|e| e.value().clone()).collect();
        all.sort_by(|a, b| a.key().cmp(&b.key()));
        all
    }

    /// Drop every entry.
    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if there are no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
