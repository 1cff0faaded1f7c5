use std::io;
use std::path::PathBuf;

use bds_crypto::DigestError;
use bds_types::{Key, TypeError};

/// Ways an insert can run out of room.
#[derive(Debug, thiserror::Error)]
pub enum CapacityError {
    /// Every character of the key was consumed without reaching a directory
    /// with free space.
    #[error("directory structure is too full to place {key}")]
    TreeExhausted { key: Key },

    /// The archive holds more members than the store accepts.
    #[error("too many entries in archive (limit {limit}, but {seen} given)")]
    TooManyArchiveEntries { limit: usize, seen: usize },
}

/// Errors from storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The storage root or a configuration value is unusable.
    #[error("invalid configuration for {path:?}: {reason}")]
    Configuration { path: PathBuf, reason: String },

    /// The storage root exists but cannot be read or written.
    #[error("cannot access {path:?}, please check permissions: {source}")]
    Access {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The source cannot be rewound and re-read.
    #[error("source must support reading and seeking to its start: {0}")]
    InputInterface(#[source] io::Error),

    /// No entry is stored under the key.
    #[error("no entry stored under {0}")]
    NotFound(Key),

    /// The supplied path does not exist.
    #[error("unknown path {0:?}")]
    UnknownPath(PathBuf),

    /// Key space or archive entry cap exhausted.
    #[error("capacity exceeded: {0}")]
    Capacity(#[from] CapacityError),

    /// A path resolves outside the storage root.
    #[error("path {path:?} is not inside the storage root {root:?}")]
    PathScope { path: PathBuf, root: PathBuf },

    /// The archive or one of its members is malformed.
    #[error("archive error: {0}")]
    Archive(String),

    /// Archive expansion was requested from a store opened without an
    /// archive format.
    #[error("this store was opened without archive support")]
    ArchiveUnsupported,

    /// A key supplied as text failed validation.
    #[error(transparent)]
    InvalidKey(#[from] TypeError),

    /// I/O error from the filesystem.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// An operation failed and removing its partial artifact failed too.
    #[error("{source}; rollback of {path:?} also failed: {cleanup}")]
    Rollback {
        #[source]
        source: Box<StoreError>,
        path: PathBuf,
        cleanup: io::Error,
    },
}

impl StoreError {
    /// Returns `true` for [`StoreError::NotFound`] and [`StoreError::UnknownPath`].
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_) | Self::UnknownPath(_))
    }

    /// Returns `true` for any [`CapacityError`].
    pub fn is_capacity(&self) -> bool {
        matches!(self, Self::Capacity(_))
    }

    /// The error that triggered a failed rollback, or `self`.
    pub fn root_cause(&self) -> &StoreError {
        match self {
            Self::Rollback { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

impl From<DigestError> for StoreError {
    fn from(err: DigestError) -> Self {
        match err {
            DigestError::InputInterface(e) => Self::InputInterface(e),
            DigestError::Io(e) => Self::Io(e),
            DigestError::UnknownAlgorithm(name) => Self::Configuration {
                path: PathBuf::new(),
                reason: format!("unknown hash algorithm {name:?}"),
            },
        }
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
