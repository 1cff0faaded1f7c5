//! Content digests for Balanced Disc Storage.
//!
//! Streams a seekable source through a 256-bit hash in bounded blocks and
//! derives the storage [`Key`](bds_types::Key) from the digest and byte count.
//!
//! All hashing wraps established libraries (`sha2`, `blake3`).

pub mod error;
pub mod hasher;

pub use error::DigestError;
pub use hasher::{ContentSource, Digest, DigestEngine, HashAlgorithm, DEFAULT_BLOCK_SIZE};
