//! Scan configuration types.

use derive_builder::Builder;
use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::{Deserialize, Serialize};

/// Configuration for scanning operations.
#[derive(Debug, Clone, Builder, Serialize, Deserialize)]
#[builder(setter(into), build_fn(validate = "Self::validate"))]
pub struct ScanConfig {
    /// Number of worker threads (0 = available parallelism).
    #[builder(default = "0")]
    #[serde(default)]
    pub threads: usize,

    /// Emit a progress event every this many items.
    #[builder(default = "100")]
    #[serde(default = "default_progress_interval")]
    pub progress_interval: u64,

    /// Include hidden entries.
    #[builder(default = "true")]
    #[serde(default = "default_true")]
    pub include_hidden: bool,

    /// Entry names to skip (glob syntax, matched against the name only).
    #[builder(default)]
    #[serde(default)]
    pub ignore_patterns: Vec<String>,
}

fn default_true() -> bool {
    true
}

fn default_progress_interval() -> u64 {
    100
}

impl ScanConfigBuilder {
    fn validate(&self) -> Result<(), String> {
        if self.progress_interval == Some(0) {
            return Err("Progress interval must be greater than zero".to_string());
        }
        if let Some(ref patterns) = self.ignore_patterns {
            for pattern in patterns {
                Glob::new(pattern).map_err(|e| format!("Invalid ignore pattern {pattern:?}: {e}"))?;
            }
        }
        Ok(())
    }
}

impl ScanConfig {
    /// Create a new scan config builder.
    pub fn builder() -> ScanConfigBuilder {
        ScanConfigBuilder::default()
    }

    /// Worker count to use, resolving 0 to the available parallelism.
    pub fn worker_count(&self) -> usize {
        match self.threads {
            0 => std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            n => n,
        }
    }

    /// Compile the ignore patterns. Invalid patterns are skipped.
    pub fn ignore_set(&self) -> GlobSet {
        let mut builder = GlobSetBuilder::new();
        for pattern in &self.ignore_patterns {
            if let Ok(glob) = Glob::new(pattern) {
                builder.add(glob);
            }
        }
        builder.build().unwrap_or_else(|_| GlobSet::empty())
    }

    /// Check if hidden entries should be skipped.
    pub fn should_skip_hidden(&self, hidden: bool) -> bool {
        !self.include_hidden && hidden
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            threads: 0,
            progress_interval: default_progress_interval(),
            include_hidden: true,
            ignore_patterns: Vec::new(),
        }
    }
}
