//! Foundation types for Balanced Disc Storage (BDS).
//!
//! This crate provides the identifiers and records shared by every other BDS
//! crate.
//!
//! # Key Types
//!
//! - [`Key`] -- Content-derived identifier, also the literal on-disk entry name
//! - [`KeyFormat`] -- Whether a key carries the byte-count suffix
//! - [`StoredEntry`] -- Path and key of a stored blob or expanded archive
//! - [`EntryKind`] -- Blob file or expanded archive directory

pub mod entry;
pub mod error;
pub mod key;

pub use entry::{EntryKind, StoredEntry};
pub use error::TypeError;
pub use key::{Key, KeyFormat};
