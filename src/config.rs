//! Configuration types for archive-unlock

use crate::bruteforce::Tier;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration
///
/// Every field has a sensible default; an empty JSON object is a valid configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Password list configuration
    #[serde(default)]
    pub passwords: PasswordListConfig,

    /// Brute-force search configuration
    #[serde(default)]
    pub brute_force: BruteForceConfig,

    /// Nested archive extraction configuration
    #[serde(default)]
    pub nested: NestedConfig,
}

impl Config {
    /// Load a configuration from a JSON file and validate it
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints that serde cannot express
    pub fn validate(&self) -> Result<()> {
        let bf = &self.brute_force;
        if bf.min_length == 0 {
            return Err(Error::Config {
                message: "brute-force minimum length must be at least 1".into(),
                key: Some("brute_force.min_length".into()),
            });
        }
        if bf.min_length > bf.max_length {
            return Err(Error::Config {
                message: format!(
                    "brute-force minimum length ({}) is greater than maximum length ({})",
                    bf.min_length, bf.max_length
                ),
                key: Some("brute_force.min_length".into()),
            });
        }
        if bf.workers == Some(0) {
            return Err(Error::Config {
                message: "brute-force worker count must be at least 1".into(),
                key: Some("brute_force.workers".into()),
            });
        }
        if bf.queue_capacity == Some(0) {
            return Err(Error::Config {
                message: "brute-force queue capacity must be at least 1".into(),
                key: Some("brute_force.queue_capacity".into()),
            });
        }
        if bf.enabled && bf.tiers.is_empty() {
            return Err(Error::Config {
                message: "brute force is enabled but no charset tiers are configured".into(),
                key: Some("brute_force.tiers".into()),
            });
        }
        if encoding_rs::Encoding::for_label(self.passwords.legacy_encoding.as_bytes()).is_none() {
            return Err(Error::Config {
                message: format!(
                    "unknown password list encoding '{}'",
                    self.passwords.legacy_encoding
                ),
                key: Some("passwords.legacy_encoding".into()),
            });
        }
        if self.nested.archive_extensions.is_empty() {
            return Err(Error::Config {
                message: "at least one nested archive extension is required".into(),
                key: Some("nested.archive_extensions".into()),
            });
        }
        Ok(())
    }
}

/// Password list (PasswordSource) configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PasswordListConfig {
    /// Operator-chosen password list, one password per line
    #[serde(default)]
    pub file: Option<PathBuf>,

    /// Where discovered passwords go when no list is configured (default: `~/passwords.txt`)
    #[serde(default)]
    pub default_file: Option<PathBuf>,

    /// Legacy encoding tried first when reading the list (WHATWG label, default: "gbk")
    #[serde(default = "default_legacy_encoding")]
    pub legacy_encoding: String,

    /// Skip appending a password that is already in the list (default: false)
    ///
    /// Off by default, so every discovered password is appended even when it was
    /// itself read from the list.
    #[serde(default)]
    pub dedupe_on_append: bool,
}

impl Default for PasswordListConfig {
    fn default() -> Self {
        Self {
            file: None,
            default_file: None,
            legacy_encoding: default_legacy_encoding(),
            dedupe_on_append: false,
        }
    }
}

/// What a brute-force worker does when a trial fails for a non-password reason
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FatalPolicy {
    /// Treat the failure as "not this password" and keep searching (default)
    #[default]
    Continue,
    /// Stop the whole search immediately
    Abort,
}

/// Brute-force search configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BruteForceConfig {
    /// Run brute force after the manual prompt is cancelled (default: true)
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Number of concurrent workers (None = one per available CPU)
    #[serde(default)]
    pub workers: Option<usize>,

    /// Shortest candidate length (default: 1)
    #[serde(default = "default_min_length")]
    pub min_length: usize,

    /// Longest candidate length (default: 8)
    #[serde(default = "default_max_length")]
    pub max_length: usize,

    /// Charset tiers, tried in order
    #[serde(default = "default_tiers")]
    pub tiers: Vec<Tier>,

    /// Bound of the work queue between generator and workers (None = worker count)
    #[serde(default)]
    pub queue_capacity: Option<usize>,

    /// Behaviour on non-password trial failures
    #[serde(default)]
    pub on_fatal: FatalPolicy,
}

impl BruteForceConfig {
    /// Effective worker count
    pub fn worker_count(&self) -> usize {
        self.workers.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        })
    }

    /// Effective queue capacity for `workers` workers
    pub fn queue_capacity_for(&self, workers: usize) -> usize {
        self.queue_capacity.unwrap_or(workers).max(1)
    }
}

impl Default for BruteForceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            workers: None,
            min_length: default_min_length(),
            max_length: default_max_length(),
            tiers: default_tiers(),
            queue_capacity: None,
            on_fatal: FatalPolicy::default(),
        }
    }
}

/// Nested archive extraction configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NestedConfig {
    /// Scan extracted output for further archives (default: true)
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Maximum nesting depth below the top-level output (default: 16)
    #[serde(default = "default_max_depth")]
    pub max_depth: u32,

    /// Follow symbolic links while scanning (default: false)
    #[serde(default)]
    pub follow_symlinks: bool,

    /// File extensions to treat as archives
    #[serde(default = "default_archive_extensions")]
    pub archive_extensions: Vec<String>,

    /// Prefix of the sibling directory a nested archive is extracted into
    #[serde(default = "default_output_prefix")]
    pub output_prefix: String,
}

impl Default for NestedConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_depth: default_max_depth(),
            follow_symlinks: false,
            archive_extensions: default_archive_extensions(),
            output_prefix: default_output_prefix(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_legacy_encoding() -> String {
    "gbk".into()
}

fn default_min_length() -> usize {
    1
}

fn default_max_length() -> usize {
    8
}

fn default_tiers() -> Vec<Tier> {
    Tier::ALL.to_vec()
}

fn default_max_depth() -> u32 {
    16
}

fn default_archive_extensions() -> Vec<String> {
    vec!["zip".into(), "rar".into(), "7z".into()]
}

fn default_output_prefix() -> String {
    "extracted_".into()
}
