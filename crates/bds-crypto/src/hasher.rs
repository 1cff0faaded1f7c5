use std::fmt;
use std::io::{self, Read, Seek};
use std::str::FromStr;

use bds_types::{Key, KeyFormat};
use serde::{Deserialize, Serialize};
use sha2::Digest as _;

use crate::error::DigestError;

/// Default read block size in bytes (64 KiB).
pub const DEFAULT_BLOCK_SIZE: usize = 1 << 16;

/// A byte source that can be read in bounded chunks and rewound to its start.
///
/// Everything that is both [`Read`] and [`Seek`] qualifies: files, cursors
/// over in-memory buffers, and so on.
pub trait ContentSource: Read + Seek {}

impl<T: Read + Seek + ?Sized> ContentSource for T {}

/// The 256-bit hash used to derive keys.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HashAlgorithm {
    /// SHA-256.
    #[default]
    Sha256,
    /// BLAKE3 with 32-byte output.
    Blake3,
}

impl HashAlgorithm {
    fn start(self) -> StreamingHasher {
        match self {
            Self::Sha256 => StreamingHasher::Sha256(sha2::Sha256::new()),
            Self::Blake3 => StreamingHasher::Blake3(Box::new(blake3::Hasher::new())),
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sha256 => write!(f, "sha256"),
            Self::Blake3 => write!(f, "blake3"),
        }
    }
}

impl FromStr for HashAlgorithm {
    type Err = DigestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sha256" | "sha-256" => Ok(Self::Sha256),
            "blake3" => Ok(Self::Blake3),
            _ => Err(DigestError::UnknownAlgorithm(s.to_owned())),
        }
    }
}

enum StreamingHasher {
    Sha256(sha2::Sha256),
    Blake3(Box<blake3::Hasher>),
}

impl StreamingHasher {
    fn update(&mut self, data: &[u8]) {
        match self {
            Self::Sha256(h) => h.update(data),
            Self::Blake3(h) => {
                h.update(data);
            }
        }
    }

    fn finalize_hex(self) -> String {
        match self {
            Self::Sha256(h) => hex::encode(h.finalize()),
            Self::Blake3(h) => h.finalize().to_hex().to_string(),
        }
    }
}

/// Hex digest and total byte count of a source.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Digest {
    /// Lowercase hexadecimal digest.
    pub hex: String,
    /// Number of bytes hashed.
    pub size: u64,
}

impl Digest {
    /// Derive the storage key for this digest.
    pub fn into_key(self, format: KeyFormat) -> Key {
        Key::from_digest(&self.hex, self.size, format)
    }
}

/// Streams sources through a [`HashAlgorithm`] in fixed-size blocks.
///
/// Memory use is bounded by the block size regardless of the source length.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DigestEngine {
    algorithm: HashAlgorithm,
    block_size: usize,
}

impl DigestEngine {
    /// Create an engine. A zero `block_size` is clamped to one byte.
    pub fn new(algorithm: HashAlgorithm, block_size: usize) -> Self {
        Self {
            algorithm,
            block_size: block_size.max(1),
        }
    }

    /// The hash algorithm in use.
    pub fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }

    /// Read block size in bytes.
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Hash `source` from its start and leave it rewound to the start.
    pub fn digest<S: ContentSource + ?Sized>(&self, source: &mut S) -> Result<Digest, DigestError> {
        Self::rewind(source)?;

        let mut hasher = self.algorithm.start();
        let mut buf = vec![0u8; self.block_size];
        let mut size: u64 = 0;
        loop {
            let n = match source.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            };
            hasher.update(&buf[..n]);
            size += n as u64;
        }

        Self::rewind(source)?;
        Ok(Digest {
            hex: hasher.finalize_hex(),
            size,
        })
    }

    /// Hash `source` and derive its key in one step.
    pub fn key<S: ContentSource + ?Sized>(
        &self,
        source: &mut S,
        format: KeyFormat,
    ) -> Result<Key, DigestError> {
        Ok(self.digest(source)?.into_key(format))
    }

    /// Seek `source` back to its start, classifying failure as an
    /// input-interface error.
    pub fn rewind<S: Seek + ?Sized>(source: &mut S) -> Result<(), DigestError> {
        source.rewind().map_err(DigestError::InputInterface)
    }
}

impl Default for DigestEngine {
    fn default() -> Self {
        Self::new(HashAlgorithm::default(), DEFAULT_BLOCK_SIZE)
    }
}
