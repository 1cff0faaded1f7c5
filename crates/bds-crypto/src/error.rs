use std::io;

/// Errors from digest operations.
#[derive(Debug, thiserror::Error)]
pub enum DigestError {
    /// The source could not be rewound to its start.
    #[error("source must support reading and seeking to its start: {0}")]
    InputInterface(#[source] io::Error),

    /// Reading from the source failed.
    #[error("I/O error while hashing: {0}")]
    Io(#[from] io::Error),

    /// An unknown hash algorithm name was supplied.
    #[error("unknown hash algorithm: {0}")]
    UnknownAlgorithm(String),
}
