//! Lookup chain used when the user opens a directory.

use std::path::Path;
use std::sync::Arc;

use duscope_core::{FileNode, FileTree, SizeSource};
use duscope_scan::BrowseLister;
use tracing::debug;

use crate::memory::{NavigationCache, NodeRef};
use crate::store::ScanCache;

/// Where a resolved directory came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    /// A scan recorded in this session.
    Memory,
    /// The persistent cache, possibly through a cached ancestor.
    Disk,
    /// A fresh shallow listing.
    Listing,
}

impl Source {
    /// Short label for display.
    pub fn label(self) -> &'static str {
        match self {
            Self::Memory => "memory",
            Self::Disk => "cache",
            Self::Listing => "listing",
        }
    }
}

/// A directory view together with its origin.
#[derive(Debug, Clone)]
pub struct Resolved {
    pub node: NodeRef,
    pub source: Source,
}

/// Resolves directories from memory, then disk, then a shallow listing.
#[derive(Debug)]
pub struct Navigator {
    memory: NavigationCache,
    disk: ScanCache,
    lister: BrowseLister,
}

impl Navigator {
    /// Create a navigator over the given caches.
    pub fn new(memory: NavigationCache, disk: ScanCache) -> Self {
        Self {
            memory,
            disk,
            lister: BrowseLister::default(),
        }
    }

    /// Use `lister` for the listing fallback.
    pub fn with_lister(mut self, lister: BrowseLister) -> Self {
        self.lister = lister;
        self
    }

    /// The in-memory cache.
    pub fn memory(&self) -> &NavigationCache {
        &self.memory
    }

    /// The persistent cache.
    pub fn disk(&self) -> &ScanCache {
        &self.disk
    }

    /// Best available view of `path`.
    pub fn resolve(&self, path: impl AsRef<Path>) -> Resolved {
        let path = path.as_ref();

        if let Some(node) = self.memory.lookup(path) {
            debug!(path = %path.display(), "Resolved from memory");
            return Resolved {
                node,
                source: Source::Memory,
            };
        }

        if let Some(tree) = self.disk.get(path) {
            debug!(path = %path.display(), "Resolved from disk cache");
            let tree = Arc::new(tree);
            self.memory.insert_missing(Arc::clone(&tree));
            return Resolved {
                node: NodeRef::root(tree),
                source: Source::Disk,
            };
        }

        debug!(path = %path.display(), "Resolved by listing");
        let listing = self.lister.list(path, self);
        Resolved {
            node: NodeRef::root(Arc::new(listing)),
            source: Source::Listing,
        }
    }

    /// Install a completed scan of `path` in memory and persist it.
    pub fn record(&self, path: impl AsRef<Path>, tree: FileTree) -> NodeRef {
        self.disk.put(path, &tree);
        let tree = Arc::new(tree);
        self.memory.insert(Arc::clone(&tree));
        NodeRef::root(tree)
    }

    /// Drop everything known about `path`: memory entries at or below it
    /// and the disk entry for it.
    pub fn forget(&self, path: impl AsRef<Path>) {
        let path = path.as_ref();
        self.memory.remove_under(path);
        self.disk.invalidate(path);
    }
}

impl SizeSource for Navigator {
    fn cached_node(&self, path: &Path) -> Option<FileNode> {
        self.memory
            .cached_node(path)
            .or_else(|| self.disk.cached_node(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CacheConfig;

    #[test]
    fn test_source_labels() {
        assert_eq!(Source::Memory.label(), "memory");
        assert_eq!(Source::Disk.label(), "cache");
        assert_eq!(Source::Listing.label(), "listing");
    }

    #[test]
    fn test_unknown_directory_is_listed() {
        let cache_dir = tempfile::TempDir::new().unwrap();
        let target = tempfile::TempDir::new().unwrap();
        std::fs::write(target.path().join("f"), b"abc").unwrap();
        std::fs::create_dir(target.path().join("d")).unwrap();

        let navigator = Navigator::new(
            NavigationCache::new(),
            ScanCache::open(CacheConfig::new(cache_dir.path())),
        );
        let resolved = navigator.resolve(target.path());

        assert_eq!(resolved.source, Source::Listing);
        assert_eq!(resolved.node.tree().len(), 3);
        assert!(navigator.memory().is_empty());
    }
}
