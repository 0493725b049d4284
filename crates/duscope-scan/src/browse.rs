//! Shallow listings for instant navigation.
//!
//! [`BrowseLister::list`] reads one directory level and fills in sizes for
//! subdirectories only from what a [`SizeSource`] already knows.
//! [`BrowseLister::list_sized`] sums each subdirectory on the spot; it
//! blocks and reports no progress.

use std::fs;
use std::path::Path;

use jwalk::{Parallelism, WalkDir};
use tracing::debug;

use duscope_core::{FileNode, FileTree, ScanConfig, ScanWarning, SizeSource};

use crate::listing::{EntryFilter, read_listing};
use crate::metadata::node_from_metadata;

/// Non-recursive directory lister.
#[derive(Debug, Clone)]
pub struct BrowseLister {
    config: ScanConfig,
    filter: EntryFilter,
}

impl BrowseLister {
    /// Create a lister using the entry filters from `config`.
    pub fn new(config: ScanConfig) -> Self {
        let filter = EntryFilter::new(&config);
        Self { config, filter }
    }

    /// List the immediate children of `path`.
    ///
    /// Files carry their length. Subdirectories are unscanned placeholders
    /// unless `sizes` knows them, in which case their totals are copied in.
    /// The root itself takes cached totals the same way. An unreadable
    /// directory yields an empty, scanned root and a warning.
    pub fn list(&self, path: impl AsRef<Path>, sizes: &dyn SizeSource) -> FileTree {
        let path = path.as_ref();
        let mut root = match fs::metadata(path) {
            Ok(metadata) => node_from_metadata(path.to_path_buf(), &metadata),
            Err(_) => FileNode::new_directory(path),
        };
        if let Some(cached) = sizes.cached_node(path).filter(|c| c.is_dir) {
            root.adopt_totals(&cached);
        }

        let listing = match read_listing(path, &self.filter) {
            Ok(listing) => listing,
            Err(_) if !root.is_dir => return FileTree::new(root),
            Err(err) => {
                debug!("{err}");
                root.scanned = true;
                root.size = 0;
                let mut tree = FileTree::new(root);
                tree.warnings.push(ScanWarning::listing(&err));
                return tree;
            }
        };

        let mut tree = FileTree::new(root);
        let parent = tree.root_index();
        for mut entry in listing.entries {
            if entry.is_dir {
                if let Some(cached) = sizes.cached_node(&entry.path).filter(|c| c.is_dir) {
                    entry.adopt_totals(&cached);
                }
            }
            tree.add_child(parent, entry);
        }
        tree.warnings = listing.warnings;
        tree
    }

    /// List the immediate children of `path`, sizing each subdirectory with
    /// a full recursive byte sum.
    ///
    /// Returns an empty list if the directory cannot be read.
    pub fn list_sized(&self, path: impl AsRef<Path>) -> Vec<FileNode> {
        let path = path.as_ref();
        let listing = match read_listing(path, &self.filter) {
            Ok(listing) => listing,
            Err(err) => {
                debug!("{err}");
                return Vec::new();
            }
        };

        listing
            .entries
            .into_iter()
            .map(|mut entry| {
                if entry.is_dir {
                    let totals = self.sum_directory(&entry.path);
                    entry.size = totals.size;
                    entry.file_count = totals.direct_files;
                    entry.folder_count = totals.folders;
                    entry.scanned = true;
                }
                entry
            })
            .collect()
    }

    /// Walk `dir` with jwalk and add up everything under it. Ignored
    /// entries are pruned with their whole subtree, as in a scan.
    fn sum_directory(&self, dir: &Path) -> DirTotals {
        let ignore = self.config.ignore_set();
        let walker = WalkDir::new(dir)
            .parallelism(Parallelism::RayonDefaultPool {
                busy_timeout: std::time::Duration::from_millis(100),
            })
            .skip_hidden(!self.config.include_hidden)
            .follow_links(false)
            .min_depth(1)
            .process_read_dir(move |_depth, _path, _state, children| {
                children.retain(|child| match child {
                    Ok(entry) => !ignore.is_match(entry.file_name()),
                    Err(_) => true,
                });
            });

        let mut totals = DirTotals::default();
        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    debug!("Skipping unreadable entry under {}: {err}", dir.display());
                    continue;
                }
            };

            if entry.file_type().is_dir() {
                totals.folders += 1;
            } else {
                match entry.metadata() {
                    Ok(metadata) => totals.size += metadata.len(),
                    Err(err) => debug!("Skipping {}: {err}", entry.path().display()),
                }
                if entry.depth() == 1 {
                    totals.direct_files += 1;
                }
            }
        }
        totals
    }
}

impl Default for BrowseLister {
    fn default() -> Self {
        Self::new(ScanConfig::default())
    }
}

#[derive(Debug, Default)]
struct DirTotals {
    size: u64,
    direct_files: u64,
    folders: u64,
}
