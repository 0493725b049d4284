//! Cache configuration.

use std::path::PathBuf;
use std::time::Duration;

use derive_builder::Builder;

/// Default time after which a cached scan is considered stale.
pub const DEFAULT_EXPIRATION: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Default number of hex digits of the path hash used for payload names.
pub const DEFAULT_HASH_PREFIX_LEN: usize = 32;

/// Configuration for the persistent scan cache.
#[derive(Debug, Clone, Builder)]
#[builder(setter(into), build_fn(validate = "Self::validate"))]
pub struct CacheConfig {
    /// Directory holding the index and payload files.
    pub dir: PathBuf,

    /// Entries older than this are treated as absent.
    #[builder(default = "DEFAULT_EXPIRATION")]
    pub expiration: Duration,

    /// Hex digits of the BLAKE3 path hash kept in payload file names.
    #[builder(default = "DEFAULT_HASH_PREFIX_LEN")]
    pub hash_prefix_len: usize,
}

impl CacheConfigBuilder {
    fn validate(&self) -> Result<(), String> {
        match self.dir {
            Some(ref dir) if dir.as_os_str().is_empty() => {
                return Err("Cache directory cannot be empty".to_string());
            }
            None => return Err("Cache directory is required".to_string()),
            _ => {}
        }
        if let Some(len) = self.hash_prefix_len {
            if !(8..=64).contains(&len) {
                return Err(format!("Hash prefix length must be 8..=64, got {len}"));
            }
        }
        Ok(())
    }
}

impl CacheConfig {
    /// Create a new cache config builder.
    pub fn builder() -> CacheConfigBuilder {
        CacheConfigBuilder::default()
    }

    /// Config with defaults for the given directory.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            expiration: DEFAULT_EXPIRATION,
            hash_prefix_len: DEFAULT_HASH_PREFIX_LEN,
        }
    }

    /// Platform cache directory for duscope, e.g. `~/.cache/duscope` on Linux.
    pub fn default_dir() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "duscope").map(|dirs| dirs.cache_dir().to_path_buf())
    }
}
