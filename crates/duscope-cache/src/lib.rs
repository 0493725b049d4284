//! Scan caching for duscope.
//!
//! - [`ScanCache`] persists completed scans as JSON under a cache directory
//!   and answers lookups for any path inside a cached root.
//! - [`NavigationCache`] keeps recently scanned trees in memory, indexed by
//!   every directory they contain.
//! - [`Navigator`] chains the two with a shallow listing fallback.
//!
//! # Example
//!
//! ```rust,no_run
//! use duscope_cache::{CacheConfig, NavigationCache, Navigator, ScanCache};
//!
//! let cache = ScanCache::open(CacheConfig::new("/tmp/duscope-cache"));
//! let navigator = Navigator::new(NavigationCache::new(), cache);
//!
//! let resolved = navigator.resolve("/home/user/Music");
//! println!("{} from {}", resolved.node.node().size, resolved.source.label());
//! ```

mod config;
mod error;
mod index;
mod memory;
mod navigator;
mod snapshot;
mod store;

pub use config::{CacheConfig, CacheConfigBuilder, CacheConfigBuilderError, DEFAULT_EXPIRATION};
pub use error::CacheError;
pub use index::CacheEntry;
pub use memory::{NavigationCache, NodeRef};
pub use navigator::{Navigator, Resolved, Source};
pub use snapshot::{NodeSnapshot, SNAPSHOT_VERSION, TreeSnapshot};
pub use store::ScanCache;
