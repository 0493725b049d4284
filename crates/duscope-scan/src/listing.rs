//! One-level directory listing shared by the scanner and the browse lister.

use std::fs;
use std::path::Path;

use globset::GlobSet;

use duscope_core::{FileNode, ScanConfig, ScanError, ScanWarning};

use crate::metadata::node_from_metadata;

/// Immediate entries of one directory, in `read_dir` order.
#[derive(Debug, Default)]
pub(crate) struct Listing {
    pub entries: Vec<FileNode>,
    pub warnings: Vec<ScanWarning>,
}

/// Entry filter derived from a [`ScanConfig`].
#[derive(Debug, Clone)]
pub(crate) struct EntryFilter {
    include_hidden: bool,
    ignore: GlobSet,
}

impl EntryFilter {
    pub fn new(config: &ScanConfig) -> Self {
        Self {
            include_hidden: config.include_hidden,
            ignore: config.ignore_set(),
        }
    }

    fn accepts(&self, node: &FileNode) -> bool {
        (self.include_hidden || !node.hidden) && !self.ignore.is_match(node.name.as_str())
    }
}

/// List the immediate children of `dir` without following symlinks.
///
/// Fails only when the directory itself cannot be opened. Entries whose
/// metadata cannot be read are left out and reported as warnings.
pub(crate) fn read_listing(dir: &Path, filter: &EntryFilter) -> Result<Listing, ScanError> {
    let read_dir = fs::read_dir(dir).map_err(|e| ScanError::io(dir, e))?;
    let mut listing = Listing::default();

    for entry in read_dir {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                listing
                    .warnings
                    .push(ScanWarning::listing(&ScanError::io(dir, err)));
                continue;
            }
        };

        let path = entry.path();
        let metadata = match entry.metadata() {
            Ok(metadata) => metadata,
            Err(err) => {
                listing
                    .warnings
                    .push(ScanWarning::entry(&ScanError::io(path, err)));
                continue;
            }
        };

        let node = node_from_metadata(path, &metadata);
        if filter.accepts(&node) {
            listing.entries.push(node);
        }
    }

    Ok(listing)
}
