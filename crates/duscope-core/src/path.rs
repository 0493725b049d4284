//! Normalized path keys.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// Whether paths on this platform compare case-insensitively.
const CASE_INSENSITIVE: bool = cfg!(any(windows, target_os = "macos"));

/// Comparison key for file-system paths.
///
/// Two paths refer to the same node when their keys are equal. Trailing
/// separators are dropped, and on case-insensitive platforms the key is
/// lowercased (with separators unified on Windows).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PathKey(String);

impl PathKey {
    /// Build the key for a path.
    pub fn new(path: impl AsRef<Path>) -> Self {
        let raw = path.as_ref().to_string_lossy();
        let unified = if cfg!(windows) {
            raw.replace('/', "\\")
        } else {
            raw.into_owned()
        };
        let mut key = if CASE_INSENSITIVE {
            unified.to_lowercase()
        } else {
            unified
        };
        while key.len() > 1 && key.ends_with(Self::SEPARATOR) && !key.ends_with(":\\") {
            key.pop();
        }
        Self(key)
    }

    const SEPARATOR: char = if cfg!(windows) { '\\' } else { '/' };

    /// The normalized key string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns `true` if `self` is a strict ancestor of `other`, on whole
    /// path components.
    pub fn is_ancestor_of(&self, other: &PathKey) -> bool {
        if other.0.len() <= self.0.len() || !other.0.starts_with(&self.0) {
            return false;
        }
        self.0.ends_with(Self::SEPARATOR)
            || other.0[self.0.len()..].starts_with(Self::SEPARATOR)
    }

    /// Returns `true` if `self` equals `other` or is one of its ancestors.
    pub fn contains(&self, other: &PathKey) -> bool {
        self == other || self.is_ancestor_of(other)
    }
}

impl fmt::Display for PathKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trailing_separator_ignored() {
        assert_eq!(PathKey::new("/data/music/"), PathKey::new("/data/music"));
        assert_eq!(PathKey::new("/").as_str(), "/");
    }

    #[test]
    fn test_ancestor_on_component_boundary() {
        let root = PathKey::new("/data");
        assert!(root.is_ancestor_of(&PathKey::new("/data/a/b")));
        assert!(!root.is_ancestor_of(&PathKey::new("/database")));
        assert!(!root.is_ancestor_of(&PathKey::new("/data")));
        assert!(root.contains(&PathKey::new("/data")));
        assert!(PathKey::new("/").is_ancestor_of(&PathKey::new("/etc")));
    }

    #[test]
    #[cfg(any(windows, target_os = "macos"))]
    fn test_case_insensitive_platforms() {
        assert_eq!(PathKey::new("/Data/Music"), PathKey::new("/data/MUSIC"));
    }

    #[test]
    #[cfg(not(any(windows, target_os = "macos")))]
    fn test_case_sensitive_platforms() {
        assert_ne!(PathKey::new("/Data/Music"), PathKey::new("/data/music"));
    }
}
