use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use bds_types::Key;
use tracing::debug;

use crate::error::{CapacityError, StoreResult};

/// Snapshot of one tree directory taken while walking it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct DirListing {
    /// Number of entries directly inside the directory.
    pub entries: usize,
    /// Whether an entry named by the key is among them.
    pub holds_key: bool,
}

impl DirListing {
    pub(crate) fn read(dir: &Path, key: &Key) -> io::Result<Self> {
        let mut listing = Self {
            entries: 0,
            holds_key: false,
        };
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            listing.entries += 1;
            if entry.file_name() == key.as_str() {
                listing.holds_key = true;
            }
        }
        Ok(listing)
    }
}

/// Create `dir` unless it exists. A concurrent creator winning the race is
/// not an error.
pub(crate) fn ensure_dir(dir: &Path) -> io::Result<()> {
    match fs::create_dir(dir) {
        Ok(()) => {
            debug!(path = %dir.display(), "created shard directory");
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists && dir.is_dir() => Ok(()),
        Err(e) => Err(e),
    }
}

/// Finds, creating as needed, the directory a key's entry belongs in.
///
/// The key's characters name successive directory levels below the root.
/// A level is used when it already holds the key or has room for one more
/// entry; a full level pushes the entry one level deeper, so the tree only
/// grows where leading characters actually collide.
#[derive(Clone, Debug)]
pub struct Allocator<'a> {
    root: &'a Path,
    directory_limit: usize,
}

impl<'a> Allocator<'a> {
    pub fn new(root: &'a Path, directory_limit: usize) -> Self {
        Self {
            root,
            directory_limit,
        }
    }

    /// Return the existing directory in which `key` lives or should be put.
    pub fn allocate(&self, key: &Key) -> StoreResult<PathBuf> {
        let mut dir = self.root.to_path_buf();
        let mut depth = 0usize;

        for segment in key.chars() {
            dir.push(segment.to_string());
            depth += 1;
            ensure_dir(&dir)?;

            let listing = DirListing::read(&dir, key)?;
            if listing.holds_key {
                debug!(%key, depth, path = %dir.display(), "key already stored");
                return Ok(dir);
            }
            if listing.entries < self.directory_limit {
                debug!(%key, depth, entries = listing.entries, path = %dir.display(), "allocated");
                return Ok(dir);
            }
            debug!(%key, depth, entries = listing.entries, "directory full, descending");
        }

        Err(CapacityError::TreeExhausted { key: key.clone() }.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;

    fn key(s: &str) -> Key {
        Key::parse(s).unwrap()
    }

    #[test]
    fn first_level_is_first_character() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = Allocator::new(tmp.path(), 10).allocate(&key("a1b2")).unwrap();
        assert_eq!(dir, tmp.path().join("a"));
        assert!(dir.is_dir());
    }

    #[test]
    fn full_directory_descends_by_next_character() {
        let tmp = tempfile::tempdir().unwrap();
        let alloc = Allocator::new(tmp.path(), 1);

        let first = alloc.allocate(&key("a1")).unwrap();
        fs::write(first.join("a1"), b"x").unwrap();

        let second = alloc.allocate(&key("a2")).unwrap();
        assert_eq!(second, tmp.path().join("a").join("2"));
    }

    #[test]
    fn existing_key_wins_over_capacity() {
        let tmp = tempfile::tempdir().unwrap();
        let alloc = Allocator::new(tmp.path(), 1);
        let dir = alloc.allocate(&key("a1")).unwrap();
        fs::write(dir.join("a1"), b"x").unwrap();

        // `a` is full, but it already holds the key.
        assert_eq!(alloc.allocate(&key("a1")).unwrap(), dir);
    }

    #[test]
    fn exhausted_key_is_capacity_error() {
        let tmp = tempfile::tempdir().unwrap();
        let a = tmp.path().join("a");
        fs::create_dir_all(a.join("b")).unwrap();
        fs::write(a.join("b").join("other"), b"x").unwrap();

        // `a` holds only the `b` subdirectory, `a/b` holds one file: both full.
        let err = Allocator::new(tmp.path(), 1).allocate(&key("ab")).unwrap_err();
        assert!(err.is_capacity());
        assert!(matches!(
            err,
            StoreError::Capacity(CapacityError::TreeExhausted { .. })
        ));
    }

    #[test]
    fn ensure_dir_tolerates_existing() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("x");
        ensure_dir(&dir).unwrap();
        ensure_dir(&dir).unwrap();
        assert!(dir.is_dir());
    }

    #[test]
    fn ensure_dir_rejects_file_in_the_way() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("x");
        fs::write(&path, b"file").unwrap();
        assert!(ensure_dir(&path).is_err());
    }

    #[test]
    fn listing_counts_and_detects_key() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("k1"), b"").unwrap();
        fs::create_dir(tmp.path().join("s")).unwrap();
        let listing = DirListing::read(tmp.path(), &key("k1")).unwrap();
        assert_eq!(listing, DirListing { entries: 2, holds_key: true });
        let listing = DirListing::read(tmp.path(), &key("k2")).unwrap();
        assert!(!listing.holds_key);
    }
}
