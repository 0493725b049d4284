//! In-memory navigation cache.

use std::path::Path;
use std::sync::Arc;

use dashmap::DashMap;
use duscope_core::{FileNode, FileTree, NodeIndex, PathKey, SizeSource};

/// A directory inside a shared tree.
#[derive(Debug, Clone)]
pub struct NodeRef {
    tree: Arc<FileTree>,
    index: NodeIndex,
}

impl NodeRef {
    /// Refer to `index` inside `tree`.
    pub fn new(tree: Arc<FileTree>, index: NodeIndex) -> Self {
        Self { tree, index }
    }

    /// Refer to the root of `tree`.
    pub fn root(tree: Arc<FileTree>) -> Self {
        let index = tree.root_index();
        Self { tree, index }
    }

    /// The referenced node.
    pub fn node(&self) -> &FileNode {
        self.tree.node(self.index)
    }

    /// The whole tree the node lives in.
    pub fn tree(&self) -> &Arc<FileTree> {
        &self.tree
    }

    /// Index of the node inside [`NodeRef::tree`].
    pub fn index(&self) -> NodeIndex {
        self.index
    }

    /// Owned tree rooted at the referenced node.
    pub fn to_tree(&self) -> FileTree {
        if self.index == self.tree.root_index() {
            (*self.tree).clone()
        } else {
            self.tree.subtree(self.index)
        }
    }
}

/// Maps every directory of recently scanned trees to its node, so
/// navigating into a scanned subdirectory needs no disk access.
///
/// Trees are shared, never copied: each directory entry holds an `Arc` to
/// the tree and the node's index.
#[derive(Debug, Default)]
pub struct NavigationCache {
    dirs: DashMap<PathKey, NodeRef>,
}

impl NavigationCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register every directory of `tree`, replacing anything cached at or
    /// below its root.
    pub fn insert(&self, tree: Arc<FileTree>) {
        self.remove_under(tree.root_path());
        for index in tree.walk() {
            let node = tree.node(index);
            if node.is_dir {
                self.dirs.insert(node.key(), NodeRef::new(Arc::clone(&tree), index));
            }
        }
        tracing::debug!(root = %tree.root_path().display(), dirs = self.dirs.len(), "Navigation cache updated");
    }

    /// Register the directories of `tree` that are not cached yet.
    ///
    /// Used for trees loaded from disk, which may be older than what this
    /// session already scanned below them.
    pub fn insert_missing(&self, tree: Arc<FileTree>) {
        for index in tree.walk() {
            let node = tree.node(index);
            if node.is_dir {
                self.dirs
                    .entry(node.key())
                    .or_insert_with(|| NodeRef::new(Arc::clone(&tree), index));
            }
        }
    }

    /// Node for the directory at `path`.
    pub fn lookup(&self, path: impl AsRef<Path>) -> Option<NodeRef> {
        self.dirs
            .get(&PathKey::new(path))
            .map(|entry| entry.value().clone())
    }

    /// Drop `path` and everything below it.
    pub fn remove_under(&self, path: impl AsRef<Path>) {
        let scope = PathKey::new(path);
        self.dirs.retain(|key, _| !scope.contains(key));
    }

    /// Drop everything.
    pub fn clear(&self) {
        self.dirs.clear();
    }

    /// Number of cached directories.
    pub fn len(&self) -> usize {
        self.dirs.len()
    }

    /// Returns `true` if nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.dirs.is_empty()
    }
}

impl SizeSource for NavigationCache {
    fn cached_node(&self, path: &Path) -> Option<FileNode> {
        self.lookup(path).map(|r| r.node().detached())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree() -> Arc<FileTree> {
        let mut root = FileNode::new_directory("/r");
        root.scanned = true;
        root.size = 5;
        let mut tree = FileTree::new(root);
        let root_index = tree.root_index();
        let mut a = FileNode::new_directory("/r/a");
        a.scanned = true;
        a.size = 5;
        let a = tree.add_child(root_index, a);
        tree.add_child(a, FileNode::new_file("/r/a/x", 5));
        Arc::new(tree)
    }

    #[test]
    fn test_every_directory_is_reachable() {
        let cache = NavigationCache::new();
        let tree = tree();
        cache.insert(Arc::clone(&tree));

        assert_eq!(cache.len(), 2);
        let a = cache.lookup("/r/a").unwrap();
        assert_eq!(a.node().size, 5);
        assert!(Arc::ptr_eq(a.tree(), &tree));
        assert!(cache.lookup("/r/a/x").is_none());
    }

    #[test]
    fn test_to_tree_extracts_subtree() {
        let cache = NavigationCache::new();
        cache.insert(tree());

        let sub = cache.lookup("/r/a").unwrap().to_tree();
        assert_eq!(sub.root_path(), Path::new("/r/a"));
        assert_eq!(sub.len(), 2);
    }

    #[test]
    fn test_remove_under_respects_components() {
        let cache = NavigationCache::new();
        cache.insert(tree());
        let mut other = FileNode::new_directory("/ra");
        other.scanned = true;
        cache.insert(Arc::new(FileTree::new(other)));

        cache.remove_under("/r");

        assert!(cache.lookup("/r").is_none());
        assert!(cache.lookup("/r/a").is_none());
        assert!(cache.lookup("/ra").is_some());
    }

    #[test]
    fn test_insert_missing_keeps_existing() {
        let cache = NavigationCache::new();
        let mut newer = FileNode::new_directory("/r/a");
        newer.scanned = true;
        newer.size = 99;
        cache.insert(Arc::new(FileTree::new(newer)));

        cache.insert_missing(tree());

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.lookup("/r/a").unwrap().node().size, 99);
        assert_eq!(cache.lookup("/r").unwrap().node().size, 5);
    }

    #[test]
    fn test_insert_replaces_stale_descendants() {
        let cache = NavigationCache::new();
        cache.insert(tree());

        let mut fresh = FileNode::new_directory("/r");
        fresh.scanned = true;
        cache.insert(Arc::new(FileTree::new(fresh)));

        assert!(cache.lookup("/r/a").is_none());
        assert_eq!(cache.len(), 1);
    }
}
