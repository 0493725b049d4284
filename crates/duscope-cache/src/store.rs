//! Persistent scan cache.

use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use duscope_core::{FileNode, FileTree, NodeIndex, PathKey, SizeSource};
use tracing::{debug, info, warn};

use crate::config::CacheConfig;
use crate::error::CacheError;
use crate::index::{CacheEntry, CacheIndex, INDEX_FILE, is_payload_name, payload_name};
use crate::snapshot::TreeSnapshot;

/// Disk-backed cache of completed scans.
///
/// Each cached root is one JSON payload file plus an entry in
/// `index.json`. Lookups may be answered from a cached ancestor. Failures
/// never surface: unreadable or stale data is logged and treated as a miss,
/// and failed writes leave the cache as it was.
#[derive(Debug)]
pub struct ScanCache {
    config: CacheConfig,
    index: CacheIndex,
    /// Serializes index writes.
    persist_lock: Mutex<()>,
    /// Most recently loaded payload, reused while its entry is unchanged.
    recent: Mutex<Option<(CacheEntry, Arc<FileTree>)>>,
}

impl ScanCache {
    /// Open the cache in `config.dir`, creating the directory if needed.
    ///
    /// A missing or unreadable index yields an empty cache.
    pub fn open(config: CacheConfig) -> Self {
        if let Err(err) = fs::create_dir_all(&config.dir) {
            warn!(dir = %config.dir.display(), error = %err, "Failed to create cache directory");
        }

        let index_path = config.dir.join(INDEX_FILE);
        let index = match CacheIndex::load(&index_path) {
            Ok(index) => {
                debug!(entries = index.len(), "Loaded cache index");
                index
            }
            Err(err) if err.is_not_found() => CacheIndex::new(),
            Err(err) => {
                warn!(error = %err, "Ignoring unreadable cache index");
                CacheIndex::new()
            }
        };

        Self {
            config,
            index,
            persist_lock: Mutex::new(()),
            recent: Mutex::new(None),
        }
    }

    /// Configuration in use.
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Cache directory.
    pub fn dir(&self) -> &Path {
        &self.config.dir
    }

    /// Cached tree for `path`.
    ///
    /// An exact entry wins. Otherwise the deepest fresh cached ancestor that
    /// contains `path` answers with the matching subtree.
    pub fn get(&self, path: impl AsRef<Path>) -> Option<FileTree> {
        let path = path.as_ref();
        let key = PathKey::new(path);
        let now = Utc::now();

        if let Some(entry) = self.index.get(&key) {
            if let Some(tree) = self.load_fresh(&entry, now) {
                debug!(path = %path.display(), "Cache hit");
                return Some(Arc::unwrap_or_clone(tree));
            }
        }

        let (tree, index) = self.covering_tree(path, &key, now)?;
        Some(tree.subtree(index))
    }

    /// Deepest fresh cached ancestor tree containing `path`, with the index
    /// of `path` inside it.
    fn covering_tree(
        &self,
        path: &Path,
        key: &PathKey,
        now: DateTime<Utc>,
    ) -> Option<(Arc<FileTree>, NodeIndex)> {
        for entry in self.index.ancestors_of(key) {
            let Some(tree) = self.load_fresh(&entry, now) else {
                continue;
            };
            if let Some(index) = tree.find(path) {
                debug!(path = %path.display(), root = %entry.path.display(), "Partial cache hit");
                return Some((tree, index));
            }
        }
        None
    }

    /// Cache `tree` under `path`, stamped with the current time.
    pub fn put(&self, path: impl AsRef<Path>, tree: &FileTree) {
        self.put_at(path, tree, Utc::now());
    }

    /// Cache `tree` under `path` with an explicit timestamp.
    ///
    /// Replaces any entry for the same path; its payload file is reused.
    pub fn put_at(&self, path: impl AsRef<Path>, tree: &FileTree, cached_at: DateTime<Utc>) {
        let path = path.as_ref();
        let key = PathKey::new(path);
        if tree.root().key() != key {
            warn!(
                path = %path.display(),
                root = %tree.root_path().display(),
                "Refusing to cache a tree under a different path"
            );
            return;
        }

        let file_name = payload_name(&key, self.config.hash_prefix_len);
        let payload_path = self.config.dir.join(&file_name);
        if let Err(err) = write_payload(&payload_path, &TreeSnapshot::capture(tree)) {
            warn!(path = %path.display(), error = %err, "Failed to write cache payload");
            return;
        }

        let root = tree.root();
        let previous = self.index.get(&key);
        self.index.insert(CacheEntry {
            path: path.to_path_buf(),
            cached_at,
            size: root.size,
            file_count: root.file_count,
            folder_count: root.folder_count,
            file_name: file_name.clone(),
        });
        // A different name means the prefix length changed since that put.
        if let Some(previous) = previous.filter(|p| p.file_name != file_name) {
            self.remove_payload(&previous);
        }
        self.forget_recent();
        self.persist_index();
        info!(path = %path.display(), nodes = tree.len(), "Cached scan");
    }

    /// Remove the entry for exactly `path` and its payload.
    pub fn invalidate(&self, path: impl AsRef<Path>) -> bool {
        let key = PathKey::new(path);
        match self.index.remove(&key) {
            Some(entry) => {
                self.remove_payload(&entry);
                self.forget_recent();
                self.persist_index();
                true
            }
            None => false,
        }
    }

    /// Remove every entry and every payload file.
    ///
    /// Only files the cache could have written are touched: payloads named
    /// by the index, plus orphans with a payload-shaped name. Anything else
    /// in the directory is left alone.
    pub fn clear(&self) {
        for entry in self.index.entries() {
            self.remove_payload(&entry);
        }
        self.index.clear();
        self.forget_recent();

        match fs::read_dir(&self.config.dir) {
            Ok(entries) => {
                for entry in entries.flatten() {
                    let orphan = entry.file_name().to_str().is_some_and(is_payload_name)
                        && entry.file_type().is_ok_and(|t| t.is_file());
                    if orphan {
                        let path = entry.path();
                        if let Err(err) = fs::remove_file(&path) {
                            warn!(path = %path.display(), error = %err, "Failed to remove payload");
                        }
                    }
                }
            }
            Err(err) => {
                warn!(dir = %self.config.dir.display(), error = %err, "Failed to list cache directory");
            }
        }
        self.persist_index();
        info!("Cache cleared");
    }

    /// Returns `true` if an unexpired entry exists for exactly `path`.
    pub fn is_fresh(&self, path: impl AsRef<Path>) -> bool {
        self.index
            .get(&PathKey::new(path))
            .is_some_and(|entry| !entry.is_expired(Utc::now(), self.config.expiration))
    }

    /// Returns `true` if `entry` has outlived the expiration window.
    pub fn is_expired(&self, entry: &CacheEntry) -> bool {
        entry.is_expired(Utc::now(), self.config.expiration)
    }

    /// All index entries, ordered by path. Expired entries are included.
    pub fn entries(&self) -> Vec<CacheEntry> {
        self.index.entries()
    }

    /// Number of index entries.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Returns `true` if nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Load the payload of `entry` if it is fresh and valid, dropping the
    /// entry otherwise.
    fn load_fresh(&self, entry: &CacheEntry, now: DateTime<Utc>) -> Option<Arc<FileTree>> {
        if entry.is_expired(now, self.config.expiration) {
            debug!(path = %entry.path.display(), "Cache entry expired");
            self.discard(entry);
            return None;
        }

        if let Some(tree) = self.recent_for(entry) {
            return Some(tree);
        }

        match self.load_payload(entry) {
            Ok(tree) => {
                let tree = Arc::new(tree);
                *self.recent.lock().unwrap_or_else(|e| e.into_inner()) =
                    Some((entry.clone(), Arc::clone(&tree)));
                Some(tree)
            }
            Err(err) => {
                if err.is_not_found() {
                    debug!(path = %entry.path.display(), "Dropping dangling cache entry");
                } else {
                    warn!(path = %entry.path.display(), error = %err, "Dropping unreadable cache entry");
                }
                self.discard(entry);
                None
            }
        }
    }

    /// The memoized tree, if it was loaded for exactly `entry`.
    fn recent_for(&self, entry: &CacheEntry) -> Option<Arc<FileTree>> {
        let recent = self.recent.lock().unwrap_or_else(|e| e.into_inner());
        recent
            .as_ref()
            .filter(|(loaded, _)| loaded == entry)
            .map(|(_, tree)| Arc::clone(tree))
    }

    fn forget_recent(&self) {
        *self.recent.lock().unwrap_or_else(|e| e.into_inner()) = None;
    }

    fn load_payload(&self, entry: &CacheEntry) -> Result<FileTree, CacheError> {
        let path = self.payload_path(entry);
        let bytes = fs::read(&path).map_err(|e| CacheError::io(&path, e))?;
        let snapshot: TreeSnapshot =
            serde_json::from_slice(&bytes).map_err(|e| CacheError::json(&path, e))?;
        snapshot.into_tree(&entry.key())
    }

    fn payload_path(&self, entry: &CacheEntry) -> PathBuf {
        self.config.dir.join(&entry.file_name)
    }

    /// Remove `entry` unless it was replaced concurrently.
    fn discard(&self, entry: &CacheEntry) {
        let key = entry.key();
        if self.index.get(&key).as_ref() == Some(entry) {
            self.index.remove(&key);
            self.remove_payload(entry);
            self.forget_recent();
            self.persist_index();
        }
    }

    fn remove_payload(&self, entry: &CacheEntry) {
        let path = self.payload_path(entry);
        match fs::remove_file(&path) {
            Ok(()) => {}
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => warn!(path = %path.display(), error = %err, "Failed to remove payload"),
        }
    }

    fn persist_index(&self) {
        let _guard = self.persist_lock.lock().unwrap_or_else(|e| e.into_inner());
        if let Err(err) = self.index.save(&self.config.dir.join(INDEX_FILE)) {
            warn!(error = %err, "Failed to write cache index");
        }
    }
}

impl SizeSource for ScanCache {
    /// Fresh exact entries answer from the index alone. Anything else is
    /// read from the covering ancestor's payload, which stays loaded so a
    /// listing's subdirectories share one parse.
    fn cached_node(&self, path: &Path) -> Option<FileNode> {
        let key = PathKey::new(path);
        if let Some(entry) = self.index.get(&key) {
            if !self.is_expired(&entry) {
                let mut node = FileNode::new_directory(path);
                node.size = entry.size;
                node.file_count = entry.file_count;
                node.folder_count = entry.folder_count;
                node.scanned = true;
                return Some(node);
            }
        }
        let (tree, index) = self.covering_tree(path, &key, Utc::now())?;
        Some(tree.node(index).detached())
    }
}

fn write_payload(path: &Path, snapshot: &TreeSnapshot) -> Result<(), CacheError> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let temp = tempfile::NamedTempFile::new_in(dir).map_err(|e| CacheError::io(dir, e))?;
    {
        let mut writer = BufWriter::new(temp.as_file());
        serde_json::to_writer(&mut writer, snapshot).map_err(|e| CacheError::json(path, e))?;
        writer.flush().map_err(|e| CacheError::io(path, e))?;
    }
    temp.persist(path).map_err(|e| CacheError::io(path, e.error))?;
    Ok(())
}
