//! Arena-backed file tree and statistics.
//!
//! Nodes live in a flat `Vec<FileNode>`; parent and child links are
//! [`NodeIndex`] values, so the parent back-reference never owns anything.
//! Nodes are always inserted after their parent.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use crate::error::ScanWarning;
use crate::node::{FileNode, NodeIndex};
use crate::path::PathKey;

/// Summary statistics for a tree, counted recursively.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TreeStats {
    /// Total size in bytes.
    pub total_size: u64,
    /// Total number of files.
    pub total_files: u64,
    /// Total number of directories, excluding the root.
    pub total_dirs: u64,
    /// Directories that have not been fully scanned.
    pub unscanned_dirs: u64,
    /// Maximum depth below the root.
    pub max_depth: u32,
    /// Largest file (path, size).
    pub largest_file: Option<(PathBuf, u64)>,
}

impl TreeStats {
    /// Files plus directories.
    pub fn total_items(&self) -> u64 {
        self.total_files + self.total_dirs
    }
}

/// A scanned (or listed, or rehydrated) file tree.
#[derive(Debug, Clone)]
pub struct FileTree {
    nodes: Vec<FileNode>,

    /// When the data in this tree was gathered.
    pub scanned_at: SystemTime,

    /// How long the scan took.
    pub scan_duration: Duration,

    /// Non-fatal problems encountered while building the tree.
    pub warnings: Vec<ScanWarning>,
}

impl FileTree {
    /// Create a tree holding just `root`.
    pub fn new(mut root: FileNode) -> Self {
        root.parent = None;
        root.children.clear();
        Self {
            nodes: vec![root],
            scanned_at: SystemTime::now(),
            scan_duration: Duration::ZERO,
            warnings: Vec::new(),
        }
    }

    /// Append `node` as the last child of `parent`.
    pub fn add_child(&mut self, parent: NodeIndex, mut node: FileNode) -> NodeIndex {
        let idx = NodeIndex::new(self.nodes.len());
        node.parent = Some(parent);
        node.children.clear();
        self.nodes.push(node);
        self.nodes[parent.idx()].children.push(idx);
        idx
    }

    /// Index of the root node.
    #[inline]
    pub fn root_index(&self) -> NodeIndex {
        NodeIndex(0)
    }

    /// The root node.
    #[inline]
    pub fn root(&self) -> &FileNode {
        &self.nodes[0]
    }

    /// Path the tree is rooted at.
    pub fn root_path(&self) -> &Path {
        &self.nodes[0].path
    }

    /// Get the node at `index`.
    ///
    /// Panics if the index does not belong to this tree.
    #[inline]
    pub fn node(&self, index: NodeIndex) -> &FileNode {
        &self.nodes[index.idx()]
    }

    /// Get the node at `index`, if it exists.
    #[inline]
    pub fn get(&self, index: NodeIndex) -> Option<&FileNode> {
        self.nodes.get(index.idx())
    }

    /// Mutable access for builders (scanner, cache hydrator).
    #[inline]
    pub fn node_mut(&mut self, index: NodeIndex) -> &mut FileNode {
        &mut self.nodes[index.idx()]
    }

    /// Direct children of a node in discovery order.
    pub fn children(&self, index: NodeIndex) -> impl Iterator<Item = (NodeIndex, &FileNode)> {
        self.nodes[index.idx()]
            .children
            .iter()
            .map(|&child| (child, &self.nodes[child.idx()]))
    }

    /// Parent of a node.
    pub fn parent(&self, index: NodeIndex) -> Option<NodeIndex> {
        self.nodes[index.idx()].parent
    }

    /// Other children of the node's parent.
    pub fn siblings(&self, index: NodeIndex) -> Vec<NodeIndex> {
        match self.parent(index) {
            Some(parent) => self.nodes[parent.idx()]
                .children
                .iter()
                .copied()
                .filter(|&c| c != index)
                .collect(),
            None => Vec::new(),
        }
    }

    /// Children sorted for display: directories first, then by size descending.
    ///
    /// The stored order is left untouched.
    pub fn children_sorted_by_size(&self, index: NodeIndex) -> Vec<NodeIndex> {
        let mut children = self.nodes[index.idx()].children.clone();
        children.sort_by(|a, b| {
            let a = &self.nodes[a.idx()];
            let b = &self.nodes[b.idx()];
            b.is_dir.cmp(&a.is_dir).then(b.size.cmp(&a.size))
        });
        children
    }

    /// Total number of nodes.
    #[inline]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns `true` if the tree holds no nodes.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// All nodes in arena order.
    pub fn nodes(&self) -> &[FileNode] {
        &self.nodes
    }

    /// Pre-order traversal starting at the root.
    pub fn walk(&self) -> Walk<'_> {
        self.walk_from(self.root_index())
    }

    /// Pre-order traversal of the subtree at `index`.
    pub fn walk_from(&self, index: NodeIndex) -> Walk<'_> {
        Walk {
            tree: self,
            stack: vec![index],
        }
    }

    /// Find the node for `path`, descending from the root one component at a time.
    pub fn find(&self, path: impl AsRef<Path>) -> Option<NodeIndex> {
        let target = PathKey::new(path);
        let mut current = self.root_index();
        loop {
            let node = self.node(current);
            let key = node.key();
            if key == target {
                return Some(current);
            }
            if !key.is_ancestor_of(&target) {
                return None;
            }
            current = node
                .children
                .iter()
                .copied()
                .find(|&c| self.node(c).key().contains(&target))?;
        }
    }

    /// Copy the subtree rooted at `index` into a new tree.
    ///
    /// Scan metadata is carried over; warnings are limited to paths inside
    /// the subtree.
    pub fn subtree(&self, index: NodeIndex) -> FileTree {
        let mut out = FileTree::new(self.node(index).detached());
        let mut stack = vec![(index, out.root_index())];
        while let Some((src, dst)) = stack.pop() {
            for &child in &self.node(src).children {
                let copied = out.add_child(dst, self.node(child).detached());
                stack.push((child, copied));
            }
        }
        let scope = self.node(index).key();
        out.scanned_at = self.scanned_at;
        out.scan_duration = self.scan_duration;
        out.warnings = self
            .warnings
            .iter()
            .filter(|w| scope.contains(&PathKey::new(&w.path)))
            .cloned()
            .collect();
        out
    }

    /// Compute recursive statistics.
    pub fn stats(&self) -> TreeStats {
        let mut stats = TreeStats::default();
        let mut stack = vec![(self.root_index(), 0u32)];
        while let Some((index, depth)) = stack.pop() {
            let node = self.node(index);
            stats.max_depth = stats.max_depth.max(depth);
            if node.is_dir {
                if depth > 0 {
                    stats.total_dirs += 1;
                }
                if !node.scanned {
                    stats.unscanned_dirs += 1;
                }
                for &child in &node.children {
                    stack.push((child, depth + 1));
                }
            } else {
                stats.total_files += 1;
                if stats.largest_file.as_ref().is_none_or(|(_, s)| node.size > *s) {
                    stats.largest_file = Some((node.path.clone(), node.size));
                }
            }
        }
        stats.total_size = self.root().size;
        stats
    }

    /// Total size of the tree.
    pub fn total_size(&self) -> u64 {
        self.root().size
    }

    /// Check if there were any warnings.
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}

/// Pre-order iterator over node indices.
pub struct Walk<'a> {
    tree: &'a FileTree,
    stack: Vec<NodeIndex>,
}

impl Iterator for Walk<'_> {
    type Item = NodeIndex;

    fn next(&mut self) -> Option<NodeIndex> {
        let index = self.stack.pop()?;
        self.stack
            .extend(self.tree.node(index).children.iter().rev().copied());
        Some(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> FileTree {
        // /r -> f1 (100), a/ -> f2 (50), b/
        let mut root = FileNode::new_directory("/r");
        root.scanned = true;
        root.size = 150;
        root.file_count = 1;
        root.folder_count = 2;
        let mut tree = FileTree::new(root);
        let r = tree.root_index();
        tree.add_child(r, FileNode::new_file("/r/f1", 100));
        let mut a = FileNode::new_directory("/r/a");
        a.scanned = true;
        a.size = 50;
        a.file_count = 1;
        let a = tree.add_child(r, a);
        tree.add_child(a, FileNode::new_file("/r/a/f2", 50));
        let mut b = FileNode::new_directory("/r/a/b");
        b.scanned = true;
        tree.add_child(a, b);
        tree
    }

    #[test]
    fn test_links() {
        let tree = sample();
        let a = tree.find("/r/a").unwrap();
        assert_eq!(tree.parent(a), Some(tree.root_index()));
        assert_eq!(tree.children(a).count(), 2);
        assert_eq!(tree.siblings(a).len(), 1);
        assert!(tree.siblings(tree.root_index()).is_empty());
    }

    #[test]
    fn test_find() {
        let tree = sample();
        assert_eq!(tree.find("/r"), Some(tree.root_index()));
        assert_eq!(tree.node(tree.find("/r/a/f2").unwrap()).size, 50);
        assert!(tree.find("/r/missing").is_none());
        assert!(tree.find("/other").is_none());
    }

    #[test]
    fn test_walk_is_preorder() {
        let tree = sample();
        let names: Vec<_> = tree.walk().map(|i| tree.node(i).name.to_string()).collect();
        assert_eq!(names, ["r", "f1", "a", "f2", "b"]);
    }

    #[test]
    fn test_subtree_copies_data() {
        let tree = sample();
        let a = tree.find("/r/a").unwrap();
        let sub = tree.subtree(a);
        assert_eq!(sub.len(), 3);
        assert_eq!(sub.root().path, PathBuf::from("/r/a"));
        assert_eq!(sub.root().parent, None);
        assert_eq!(sub.total_size(), 50);
        assert!(sub.find("/r/a/b").is_some());
    }

    #[test]
    fn test_stats() {
        let stats = sample().stats();
        assert_eq!(stats.total_files, 2);
        assert_eq!(stats.total_dirs, 2);
        assert_eq!(stats.total_size, 150);
        assert_eq!(stats.max_depth, 2);
        assert_eq!(stats.largest_file, Some((PathBuf::from("/r/f1"), 100)));
    }

    #[test]
    fn test_children_sorted() {
        let tree = sample();
        let sorted = tree.children_sorted_by_size(tree.root_index());
        assert_eq!(tree.node(sorted[0]).name.as_str(), "a");
        // stored order unchanged
        assert_eq!(tree.root().children[0], sorted[1]);
    }
}
