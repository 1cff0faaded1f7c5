//! Content-addressed file storage on a balanced directory tree.
//!
//! Files are stored under a key derived from their content (a 256-bit digest
//! plus, by default, the byte count). The key's leading characters name the
//! directories leading to the entry, and a directory only gets a deeper
//! level once it holds `directory_limit` entries, so no directory below the
//! root ever outgrows practical filesystem limits.
//!
//! # Layout
//!
//! ```text
//! root/
//!   a/
//!     aea92132..._2          blob
//!     e/                     created once `a/` filled up
//!       aee0f2...._3         blob
//!   b/
//!     b5770bf1..._12d/       expanded archive
//!       metadata.xml
//! ```
//!
//! # Components
//!
//! - [`Allocator`] -- finds or creates the directory for a new key
//! - [`Locator`] -- read-only walk to an existing key
//! - [`write_blob`] -- copies a source into place, removing partial files
//! - [`ArchiveFormat`] / [`expand_archive`] -- unpacks archives with an entry cap and rollback
//! - [`Remover`] -- deletes entries and prunes emptied directories
//! - [`BalancedStorage`] -- the facade tying them together
//!
//! # Design Rules
//!
//! 1. Entries are immutable once written; re-adding content is a no-op.
//! 2. Allocation and lookup walk the same levels for the same tree state.
//! 3. Nothing is created or removed outside the root, and the root itself is
//!    never removed.
//! 4. Failed inserts remove their own partial artifact before the error
//!    surfaces.
//! 5. One writer per root; directory creation tolerates races, the rest is
//!    not atomic across processes.

pub mod allocator;
pub mod archive;
pub mod config;
pub mod error;
pub mod locator;
pub mod remover;
pub mod storage;
pub mod writer;

// Re-export primary types at crate root for ergonomic imports.
pub use allocator::Allocator;
pub use archive::{expand_archive, ArchiveFormat, ArchiveReader, ZipFormat};
pub use bds_crypto::{ContentSource, HashAlgorithm};
pub use bds_types::{EntryKind, Key, KeyFormat, StoredEntry};
pub use config::{StoreConfig, DEFAULT_DIRECTORY_LIMIT, DEFAULT_READ_BLOCK_SIZE};
pub use error::{CapacityError, StoreError, StoreResult};
pub use locator::Locator;
pub use remover::Remover;
pub use storage::BalancedStorage;
pub use writer::write_blob;
