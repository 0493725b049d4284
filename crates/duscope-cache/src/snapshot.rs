//! Serializable form of a [`FileTree`].
//!
//! Nodes are stored flat in pre-order, each naming its parent by position.
//! This keeps payloads free of deep JSON nesting, which `serde_json` refuses
//! past a fixed recursion limit.

use std::path::PathBuf;
use std::time::{Duration, SystemTime};

use chrono::{DateTime, Utc};
use duscope_core::{FileNode, FileTree, NodeIndex, PathKey, ScanWarning};
use serde::{Deserialize, Serialize};

use crate::error::CacheError;

/// Current payload format version.
pub const SNAPSHOT_VERSION: u32 = 1;

/// A whole scan result as written to disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeSnapshot {
    pub version: u32,
    pub scanned_at: DateTime<Utc>,
    pub scan_duration_ms: u64,
    pub nodes: Vec<NodeSnapshot>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<ScanWarning>,
}

/// One node of a [`TreeSnapshot`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeSnapshot {
    /// Position of the parent in [`TreeSnapshot::nodes`]; `None` for the root.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<u32>,
    pub path: PathBuf,
    pub is_dir: bool,
    #[serde(default)]
    pub hidden: bool,
    #[serde(default)]
    pub system: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified: Option<DateTime<Utc>>,
    pub size: u64,
    #[serde(default)]
    pub file_count: u64,
    #[serde(default)]
    pub folder_count: u64,
    pub scanned: bool,
}

impl NodeSnapshot {
    fn capture(node: &FileNode, parent: Option<u32>) -> Self {
        Self {
            parent,
            path: node.path.clone(),
            is_dir: node.is_dir,
            hidden: node.hidden,
            system: node.system,
            modified: node.modified.map(DateTime::<Utc>::from),
            size: node.size,
            file_count: node.file_count,
            folder_count: node.folder_count,
            scanned: node.scanned,
        }
    }

    fn to_node(&self) -> FileNode {
        let base = if self.is_dir {
            FileNode::new_directory(&self.path)
        } else {
            FileNode::new_file(&self.path, self.size)
        };
        let mut node = base
            .with_modified(self.modified.map(SystemTime::from))
            .with_attributes(self.hidden, self.system);
        node.size = self.size;
        node.file_count = self.file_count;
        node.folder_count = self.folder_count;
        node.scanned = self.scanned;
        node
    }
}

impl TreeSnapshot {
    /// Capture `tree`, children in their tree order.
    pub fn capture(tree: &FileTree) -> Self {
        let mut positions = vec![0u32; tree.len()];
        let mut nodes = Vec::with_capacity(tree.len());

        for index in tree.walk() {
            let node = tree.node(index);
            let parent = node.parent.map(|p| positions[p.idx()]);
            positions[index.idx()] = nodes.len() as u32;
            nodes.push(NodeSnapshot::capture(node, parent));
        }

        Self {
            version: SNAPSHOT_VERSION,
            scanned_at: DateTime::<Utc>::from(tree.scanned_at),
            scan_duration_ms: tree.scan_duration.as_millis() as u64,
            nodes,
            warnings: tree.warnings.clone(),
        }
    }

    /// Rebuild the tree, checking that it is rooted at `expected_root` and
    /// structurally sound.
    pub fn into_tree(self, expected_root: &PathKey) -> Result<FileTree, CacheError> {
        if self.version != SNAPSHOT_VERSION {
            return Err(CacheError::Version {
                found: self.version,
                expected: SNAPSHOT_VERSION,
            });
        }

        let (root, rest) = self
            .nodes
            .split_first()
            .ok_or_else(|| CacheError::invalid("snapshot has no nodes"))?;
        if root.parent.is_some() {
            return Err(CacheError::invalid("root node has a parent"));
        }
        if PathKey::new(&root.path) != *expected_root {
            return Err(CacheError::invalid(format!(
                "snapshot is rooted at {}, expected {expected_root}",
                root.path.display()
            )));
        }

        let mut tree = FileTree::new(root.to_node());
        let mut indices: Vec<NodeIndex> = Vec::with_capacity(self.nodes.len());
        indices.push(tree.root_index());

        for (offset, snapshot) in rest.iter().enumerate() {
            let position = offset + 1;
            let parent = snapshot
                .parent
                .map(|p| p as usize)
                .filter(|&p| p < position)
                .ok_or_else(|| {
                    CacheError::invalid(format!("node {position} has no earlier parent"))
                })?;
            let parent_index = indices[parent];
            let parent_node = tree.node(parent_index);
            if !parent_node.is_dir {
                return Err(CacheError::invalid(format!(
                    "{} is listed under a file",
                    snapshot.path.display()
                )));
            }
            if snapshot.path.parent().map(PathKey::new) != Some(parent_node.key()) {
                return Err(CacheError::invalid(format!(
                    "{} is not a direct child of {}",
                    snapshot.path.display(),
                    parent_node.path.display()
                )));
            }
            indices.push(tree.add_child(parent_index, snapshot.to_node()));
        }

        tree.scanned_at = SystemTime::from(self.scanned_at);
        tree.scan_duration = Duration::from_millis(self.scan_duration_ms);
        tree.warnings = self.warnings;
        Ok(tree)
    }
}
