//! File and directory node types.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use compact_str::CompactString;
use serde::{Deserialize, Serialize};

use crate::path::PathKey;

/// Index of a node inside its [`FileTree`](crate::FileTree) arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeIndex(pub u32);

impl NodeIndex {
    /// Create a new index from an arena position.
    #[inline]
    pub fn new(index: usize) -> Self {
        debug_assert!(index <= u32::MAX as usize, "NodeIndex overflow");
        Self(index as u32)
    }

    /// The arena position.
    #[inline]
    pub fn idx(self) -> usize {
        self.0 as usize
    }
}

/// A single file or directory in the tree.
///
/// For a scanned directory `size` is the sum of its direct file sizes plus
/// the sizes of its child directories, `folder_count` counts every
/// descendant directory, and `file_count` counts only the files directly
/// inside it.
#[derive(Debug, Clone, PartialEq)]
pub struct FileNode {
    /// Absolute path of the entry.
    pub path: PathBuf,

    /// File/directory name (last path component).
    pub name: CompactString,

    /// `true` for directories.
    pub is_dir: bool,

    /// Hidden attribute (dot-file on Unix, `FILE_ATTRIBUTE_HIDDEN` on Windows).
    pub hidden: bool,

    /// System attribute (Windows only).
    pub system: bool,

    /// Last modification time, if it could be read.
    pub modified: Option<SystemTime>,

    /// Size in bytes (aggregate for directories).
    pub size: u64,

    /// Number of files directly inside this directory.
    pub file_count: u64,

    /// Number of directories anywhere below this directory.
    pub folder_count: u64,

    /// Whether size and counts reflect a completed aggregation.
    pub scanned: bool,

    /// Parent node, if any. Never used for ownership.
    pub parent: Option<NodeIndex>,

    /// Children in discovery order.
    pub children: Vec<NodeIndex>,
}

impl FileNode {
    /// Create a file node. Files are always considered scanned.
    pub fn new_file(path: impl Into<PathBuf>, size: u64) -> Self {
        let path = path.into();
        Self {
            name: name_of(&path),
            path,
            is_dir: false,
            hidden: false,
            system: false,
            modified: None,
            size,
            file_count: 0,
            folder_count: 0,
            scanned: true,
            parent: None,
            children: Vec::new(),
        }
    }

    /// Create a directory placeholder whose size is not known yet.
    pub fn new_directory(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        Self {
            name: name_of(&path),
            path,
            is_dir: true,
            hidden: false,
            system: false,
            modified: None,
            size: 0,
            file_count: 0,
            folder_count: 0,
            scanned: false,
            parent: None,
            children: Vec::new(),
        }
    }

    /// Set the modification time.
    pub fn with_modified(mut self, modified: Option<SystemTime>) -> Self {
        self.modified = modified;
        self
    }

    /// Set the hidden and system attributes.
    pub fn with_attributes(mut self, hidden: bool, system: bool) -> Self {
        self.hidden = hidden;
        self.system = system;
        self
    }

    /// Check if this node is a directory.
    pub fn is_dir(&self) -> bool {
        self.is_dir
    }

    /// Check if this node is a file.
    pub fn is_file(&self) -> bool {
        !self.is_dir
    }

    /// Size in bytes, or `None` for a directory that has not been scanned.
    pub fn known_size(&self) -> Option<u64> {
        (self.scanned || !self.is_dir).then_some(self.size)
    }

    /// Comparison key for this node's path.
    pub fn key(&self) -> PathKey {
        PathKey::new(&self.path)
    }

    /// Get the number of direct children.
    pub fn child_count(&self) -> usize {
        self.children.len()
    }

    /// Copy of this node without its tree links.
    pub fn detached(&self) -> Self {
        Self {
            parent: None,
            children: Vec::new(),
            ..self.clone()
        }
    }

    /// Copy the aggregated figures of `other` into this node.
    pub fn adopt_totals(&mut self, other: &FileNode) {
        self.size = other.size;
        self.file_count = other.file_count;
        self.folder_count = other.folder_count;
        self.scanned = other.scanned;
    }
}

/// Display name for a path: the last component, or the whole path for roots.
fn name_of(path: &Path) -> CompactString {
    match path.file_name() {
        Some(name) => CompactString::new(name.to_string_lossy()),
        None => CompactString::new(path.to_string_lossy()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_index() {
        let idx = NodeIndex::new(42);
        assert_eq!(idx.0, 42);
        assert_eq!(idx.idx(), 42);
    }

    #[test]
    fn test_file_node_creation() {
        let node = FileNode::new_file("/data/test.txt", 1024);
        assert!(node.is_file());
        assert!(!node.is_dir());
        assert_eq!(node.name.as_str(), "test.txt");
        assert_eq!(node.known_size(), Some(1024));
    }

    #[test]
    fn test_directory_placeholder_has_unknown_size() {
        let mut node = FileNode::new_directory("/data/dir");
        assert!(node.is_dir());
        assert_eq!(node.known_size(), None);

        node.scanned = true;
        assert_eq!(node.known_size(), Some(0));
    }

    #[test]
    fn test_root_name_is_whole_path() {
        let node = FileNode::new_directory("/");
        assert_eq!(node.name.as_str(), "/");
    }
}
