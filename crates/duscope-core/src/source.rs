//! Lookup seam for already-known directory sizes.

use std::path::Path;

use crate::node::FileNode;

/// Something that may already know the aggregated size of a directory.
///
/// Shallow listings consult a `SizeSource` to show sizes for
/// subdirectories without rescanning them. Implementations return a
/// detached copy; callers must not expect to mutate cached data through it.
pub trait SizeSource {
    /// Return a copy of the cached node for `path`, if known.
    fn cached_node(&self, path: &Path) -> Option<FileNode>;
}

/// A [`SizeSource`] that knows nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSizes;

impl SizeSource for NoSizes {
    fn cached_node(&self, _path: &Path) -> Option<FileNode> {
        None
    }
}

impl<T: SizeSource + ?Sized> SizeSource for &T {
    fn cached_node(&self, path: &Path) -> Option<FileNode> {
        (**self).cached_node(path)
    }
}
