//! Core types and traits for duscope.
//!
//! This crate provides the data model shared by the scanner and the caches:
//! arena-backed file trees, case-aware path keys, scan configuration,
//! error and warning types, and size formatting for display.

mod config;
mod error;
mod format;
mod node;
mod path;
mod source;
mod tree;

pub use config::{ScanConfig, ScanConfigBuilder, ScanConfigBuilderError};
pub use error::{ScanError, ScanWarning, WarningKind};
pub use format::{format_count, format_size};
pub use node::{FileNode, NodeIndex};
pub use path::PathKey;
pub use source::{NoSizes, SizeSource};
pub use tree::{FileTree, TreeStats, Walk};
