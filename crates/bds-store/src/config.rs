use std::path::{Path, PathBuf};

use bds_crypto::{HashAlgorithm, DEFAULT_BLOCK_SIZE};
use bds_types::KeyFormat;
use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};

/// Default maximum number of entries in one tree directory.
pub const DEFAULT_DIRECTORY_LIMIT: usize = 32_000;

/// Default read block size in bytes.
pub const DEFAULT_READ_BLOCK_SIZE: usize = DEFAULT_BLOCK_SIZE;

fn default_directory_limit() -> usize {
    DEFAULT_DIRECTORY_LIMIT
}

fn default_read_block_size() -> usize {
    DEFAULT_READ_BLOCK_SIZE
}

/// Construction-time settings of a [`BalancedStorage`](crate::BalancedStorage).
///
/// Only `root` is required; every other field has a default, both in code
/// and when deserialized:
///
/// ```toml
/// root = "/var/lib/bds"
/// directory_limit = 32000
/// read_block_size = 65536
/// hash_algorithm = "sha256"
/// key_format = "size-suffixed"
/// max_archive_entries = 1000
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Directory the tree is built in. Must exist and be readable and writable.
    pub root: PathBuf,
    /// Maximum entries directly inside any non-root tree directory.
    #[serde(default = "default_directory_limit")]
    pub directory_limit: usize,
    /// Block size for hashing and copying sources.
    #[serde(default = "default_read_block_size")]
    pub read_block_size: usize,
    /// Digest used to derive keys.
    #[serde(default)]
    pub hash_algorithm: HashAlgorithm,
    /// Whether keys carry the byte-count suffix.
    #[serde(default)]
    pub key_format: KeyFormat,
    /// Maximum members of an expanded archive; `None` means `directory_limit`.
    #[serde(default)]
    pub max_archive_entries: Option<usize>,
}

impl StoreConfig {
    /// Default settings for the given root.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            directory_limit: DEFAULT_DIRECTORY_LIMIT,
            read_block_size: DEFAULT_READ_BLOCK_SIZE,
            hash_algorithm: HashAlgorithm::default(),
            key_format: KeyFormat::default(),
            max_archive_entries: None,
        }
    }

    pub fn with_directory_limit(mut self, limit: usize) -> Self {
        self.directory_limit = limit;
        self
    }

    pub fn with_read_block_size(mut self, size: usize) -> Self {
        self.read_block_size = size;
        self
    }

    pub fn with_hash_algorithm(mut self, algorithm: HashAlgorithm) -> Self {
        self.hash_algorithm = algorithm;
        self
    }

    pub fn with_key_format(mut self, format: KeyFormat) -> Self {
        self.key_format = format;
        self
    }

    pub fn with_max_archive_entries(mut self, max: usize) -> Self {
        self.max_archive_entries = Some(max);
        self
    }

    /// Archive member cap after applying the default.
    pub fn effective_max_archive_entries(&self) -> usize {
        self.max_archive_entries.unwrap_or(self.directory_limit)
    }

    /// Check the numeric settings. The root itself is validated when the
    /// store is opened.
    pub fn validate(&self) -> StoreResult<()> {
        let invalid = |reason: &str| StoreError::Configuration {
            path: self.root.clone(),
            reason: reason.to_owned(),
        };
        if self.root.as_os_str().is_empty() {
            return Err(invalid("storage root must be set"));
        }
        if self.directory_limit == 0 {
            return Err(invalid("directory_limit must be positive"));
        }
        if self.read_block_size == 0 {
            return Err(invalid("read_block_size must be positive"));
        }
        if self.max_archive_entries == Some(0) {
            return Err(invalid("max_archive_entries must be positive"));
        }
        Ok(())
    }

    /// The configured root path.
    pub fn root(&self) -> &Path {
        &self.root
    }
}
