//! File system scanning engine for duscope.
//!
//! This crate walks directory trees and builds [`FileTree`]s with sizes and
//! counts aggregated bottom-up.
//!
//! # Overview
//!
//! - **Parallel recursion** on a rayon pool, one task per subdirectory
//! - **Progress updates** via a broadcast channel that never blocks the scan
//! - **Cooperative cancellation** via [`CancellationToken`]; a cancelled scan
//!   still returns the partial tree
//! - **Shallow listings** for instant navigation ([`BrowseLister`])
//!
//! # Example
//!
//! ```rust,no_run
//! use duscope_scan::{CancellationToken, ScanConfig, TreeScanner};
//!
//! let scanner = TreeScanner::new(ScanConfig::default());
//! let cancel = CancellationToken::new();
//! let tree = scanner.scan("/path/to/scan", &cancel);
//!
//! println!("Total size: {} bytes", tree.total_size());
//! println!("Folders: {}", tree.root().folder_count);
//! ```
//!
//! # Progress Monitoring
//!
//! ```rust,no_run
//! use duscope_scan::{ScanConfig, TreeScanner};
//!
//! let scanner = TreeScanner::new(ScanConfig::default());
//! let mut progress_rx = scanner.subscribe();
//!
//! tokio::spawn(async move {
//!     while let Ok(progress) = progress_rx.recv().await {
//!         println!("{} items, at {}", progress.items_scanned, progress.current_path.display());
//!     }
//! });
//! ```

mod browse;
mod listing;
mod metadata;
mod progress;
mod scanner;

pub use browse::BrowseLister;
pub use progress::{ProgressThrottle, ScanProgress};
pub use scanner::TreeScanner;
pub use tokio_util::sync::CancellationToken;

// Re-export core types for convenience
pub use duscope_core::{
    FileNode, FileTree, NoSizes, NodeIndex, ScanConfig, ScanWarning, SizeSource, TreeStats,
    WarningKind,
};
