//! Concurrent recursive directory scanner.

use std::fs;
use std::path::Path;

use rayon::prelude::*;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use duscope_core::{FileNode, FileTree, NodeIndex, ScanConfig, ScanError, ScanWarning};

use crate::listing::{EntryFilter, read_listing};
use crate::metadata::node_from_metadata;
use crate::progress::{ProgressTracker, ScanProgress};

/// Capacity of the progress broadcast channel.
const PROGRESS_CHANNEL_CAPACITY: usize = 256;

/// Scanner that walks a directory tree on a rayon pool and aggregates
/// sizes bottom-up.
pub struct TreeScanner {
    config: ScanConfig,
    progress_tx: broadcast::Sender<ScanProgress>,
}

impl TreeScanner {
    /// Create a new scanner.
    pub fn new(config: ScanConfig) -> Self {
        let (progress_tx, _) = broadcast::channel(PROGRESS_CHANNEL_CAPACITY);
        Self {
            config,
            progress_tx,
        }
    }

    /// Subscribe to scan progress updates.
    pub fn subscribe(&self) -> broadcast::Receiver<ScanProgress> {
        self.progress_tx.subscribe()
    }

    /// The configuration this scanner was built with.
    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    /// Scan `root` and return the aggregated tree.
    ///
    /// This never fails. Entries that cannot be read are recorded as
    /// warnings and count as zero bytes; an unreadable root yields a single
    /// empty, scanned node. If `cancel` fires, the partially built tree is
    /// returned: directories whose subtree was cut short keep their partial
    /// totals with `scanned == false`. Check `cancel.is_cancelled()` to tell
    /// a complete scan from a cancelled one.
    pub fn scan(&self, root: impl AsRef<Path>, cancel: &CancellationToken) -> FileTree {
        let root = root.as_ref();
        info!("Starting scan of {}", root.display());

        let tracker = ProgressTracker::new(&self.progress_tx, self.config.progress_interval);
        let walker = Walker {
            filter: EntryFilter::new(&self.config),
            cancel,
            tracker: &tracker,
        };

        let (root_node, mut warnings) = root_node(root);
        let mut tree = if !warnings.is_empty() {
            FileTree::new(root_node)
        } else if root_node.is_dir {
            let threads = self.config.worker_count();
            let work = match rayon::ThreadPoolBuilder::new()
                .num_threads(threads)
                .thread_name(|i| format!("duscope-scan-{i}"))
                .build()
            {
                Ok(pool) => pool.install(|| walker.walk(root_node)),
                Err(err) => {
                    warn!("Could not build scan pool ({err}), using the global pool");
                    walker.walk(root_node)
                }
            };
            work.into_tree(&mut warnings)
        } else {
            tracker.record_file(&root_node.path, root_node.size);
            FileTree::new(root_node)
        };
        tree.warnings = warnings;
        tree.scan_duration = tracker.elapsed();

        if cancel.is_cancelled() {
            info!(
                "Scan of {} cancelled after {} items",
                root.display(),
                tracker.items()
            );
        } else {
            info!(
                "Scan of {} complete: {} items, {} bytes, {} warnings in {:?}",
                root.display(),
                tracker.items(),
                tree.total_size(),
                tree.warnings.len(),
                tree.scan_duration
            );
        }
        tree
    }
}

impl Default for TreeScanner {
    fn default() -> Self {
        Self::new(ScanConfig::default())
    }
}

/// Build the root node, following a symlinked root.
fn root_node(root: &Path) -> (FileNode, Vec<ScanWarning>) {
    match fs::metadata(root) {
        Ok(metadata) => (node_from_metadata(root.to_path_buf(), &metadata), Vec::new()),
        Err(err) => {
            let err = ScanError::io(root, err);
            debug!("{err}");
            let mut node = FileNode::new_directory(root);
            node.scanned = true;
            (node, vec![ScanWarning::listing(&err)])
        }
    }
}

/// Shared, read-only state for one scan.
struct Walker<'a> {
    filter: EntryFilter,
    cancel: &'a CancellationToken,
    tracker: &'a ProgressTracker<'a>,
}

impl Walker<'_> {
    /// Walk everything below `root`, one directory level per round.
    ///
    /// Each round lists the whole frontier in parallel. Depth costs heap,
    /// not stack, so arbitrarily deep trees are fine.
    fn walk(&self, root: FileNode) -> WorkList {
        let mut work = WorkList::new(root);
        let mut frontier = vec![0usize];

        while !frontier.is_empty() && !self.cancel.is_cancelled() {
            let listed: Vec<(usize, Visit)> = frontier
                .par_iter()
                .map(|&slot| (slot, self.visit(&work.slots[slot].node)))
                .collect();

            frontier = Vec::new();
            for (slot, visit) in listed {
                match visit {
                    Visit::Skipped => {}
                    Visit::Failed(warning) => {
                        let dir = &mut work.slots[slot];
                        dir.node.scanned = true;
                        dir.listed = true;
                        dir.warnings.push(warning);
                    }
                    Visit::Listed(entries, warnings) => {
                        let dir = &mut work.slots[slot];
                        dir.listed = true;
                        dir.warnings = warnings;
                        for entry in entries {
                            if entry.is_dir {
                                frontier.push(work.slots.len());
                            }
                            work.push(slot, entry);
                        }
                    }
                }
            }
        }

        work.aggregate();
        work
    }

    /// List one directory and count its files.
    fn visit(&self, dir: &FileNode) -> Visit {
        if self.cancel.is_cancelled() {
            return Visit::Skipped;
        }

        let listing = match read_listing(&dir.path, &self.filter) {
            Ok(listing) => listing,
            Err(err) => {
                debug!("{err}");
                self.tracker.record_dir(&dir.path);
                return Visit::Failed(ScanWarning::listing(&err));
            }
        };

        for entry in listing.entries.iter().filter(|e| !e.is_dir) {
            self.tracker.record_file(&entry.path, entry.size);
        }
        self.tracker.record_dir(&dir.path);
        Visit::Listed(listing.entries, listing.warnings)
    }
}

/// Outcome of listing one directory.
enum Visit {
    /// Cancelled before the directory was opened.
    Skipped,
    Failed(ScanWarning),
    Listed(Vec<FileNode>, Vec<ScanWarning>),
}

/// Scan result before it is laid out in the arena.
///
/// Slots are in discovery order: every parent precedes its children and
/// siblings are contiguous, in listing order.
struct WorkList {
    slots: Vec<Slot>,
}

struct Slot {
    node: FileNode,
    parent: Option<usize>,
    /// The directory was opened (or failed to open) before cancellation.
    listed: bool,
    warnings: Vec<ScanWarning>,
}

impl WorkList {
    fn new(root: FileNode) -> Self {
        Self {
            slots: vec![Slot {
                node: root,
                parent: None,
                listed: false,
                warnings: Vec::new(),
            }],
        }
    }

    fn push(&mut self, parent: usize, node: FileNode) {
        self.slots.push(Slot {
            node,
            parent: Some(parent),
            listed: false,
            warnings: Vec::new(),
        });
    }

    /// Roll up sizes and counts bottom-up. Walking the slots backwards
    /// visits every child before its parent.
    fn aggregate(&mut self) {
        for slot in &mut self.slots {
            if slot.node.is_dir {
                slot.node.size = 0;
                slot.node.file_count = 0;
                slot.node.folder_count = 0;
                // Opened directories start complete; an unopened one never is.
                slot.node.scanned = slot.listed;
            }
        }

        for i in (1..self.slots.len()).rev() {
            let Some(parent) = self.slots[i].parent else {
                continue;
            };
            let (size, folders, complete, is_dir) = {
                let child = &self.slots[i].node;
                (child.size, child.folder_count, child.scanned, child.is_dir)
            };
            let parent = &mut self.slots[parent].node;
            parent.size += size;
            if is_dir {
                parent.folder_count += 1 + folders;
                parent.scanned &= complete;
            } else {
                parent.file_count += 1;
            }
        }
    }

    /// Lay the result out in a fresh arena. Warnings are moved into
    /// `warnings`.
    fn into_tree(self, warnings: &mut Vec<ScanWarning>) -> FileTree {
        let mut tree = FileTree::new(self.slots[0].node.clone());
        let mut indices: Vec<NodeIndex> = Vec::with_capacity(self.slots.len());
        indices.push(tree.root_index());

        let mut slots = self.slots.into_iter();
        if let Some(root) = slots.next() {
            warnings.extend(root.warnings);
        }
        for slot in slots {
            let parent = indices[slot.parent.unwrap_or(0)];
            indices.push(tree.add_child(parent, slot.node));
            warnings.extend(slot.warnings);
        }
        tree
    }
}
