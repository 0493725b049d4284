//! Cross-platform metadata helpers.

use std::fs::Metadata;
use std::path::PathBuf;

use duscope_core::FileNode;

/// Build a node for an entry from its (non-followed) metadata.
pub(crate) fn node_from_metadata(path: PathBuf, metadata: &Metadata) -> FileNode {
    let hidden = is_hidden(&path, metadata);
    let system = is_system(metadata);
    let node = if metadata.is_dir() {
        FileNode::new_directory(path)
    } else {
        FileNode::new_file(path, metadata.len())
    };
    node.with_modified(metadata.modified().ok())
        .with_attributes(hidden, system)
}

#[cfg(windows)]
const FILE_ATTRIBUTE_HIDDEN: u32 = 0x2;
#[cfg(windows)]
const FILE_ATTRIBUTE_SYSTEM: u32 = 0x4;

/// Check the hidden attribute.
#[cfg(windows)]
fn is_hidden(_path: &std::path::Path, metadata: &Metadata) -> bool {
    use std::os::windows::fs::MetadataExt;
    metadata.file_attributes() & FILE_ATTRIBUTE_HIDDEN != 0
}

/// Dot-files are hidden on Unix.
#[cfg(not(windows))]
fn is_hidden(path: &std::path::Path, _metadata: &Metadata) -> bool {
    path.file_name()
        .is_some_and(|name| name.to_string_lossy().starts_with('.'))
}

/// Check the system attribute.
#[cfg(windows)]
fn is_system(metadata: &Metadata) -> bool {
    use std::os::windows::fs::MetadataExt;
    metadata.file_attributes() & FILE_ATTRIBUTE_SYSTEM != 0
}

#[cfg(not(windows))]
fn is_system(_metadata: &Metadata) -> bool {
    false // No system attribute outside Windows
}
