use std::fs;
use std::io;
use std::path::Path;

use bds_types::{EntryKind, Key, StoredEntry};
use tracing::debug;

use crate::error::{StoreError, StoreResult};

/// Read-only counterpart of the [`Allocator`](crate::Allocator).
///
/// Walks the same levels the allocator would, but decides by presence
/// instead of capacity: the key is looked for at each level and the walk
/// only continues while the next-character subdirectory exists. Nothing is
/// ever created.
#[derive(Clone, Debug)]
pub struct Locator<'a> {
    root: &'a Path,
}

impl<'a> Locator<'a> {
    pub fn new(root: &'a Path) -> Self {
        Self { root }
    }

    /// Find the stored entry for `key`.
    pub fn locate(&self, key: &Key) -> StoreResult<StoredEntry> {
        let mut dir = self.root.to_path_buf();

        for segment in key.chars() {
            dir.push(segment.to_string());
            if !dir.is_dir() {
                break;
            }

            let candidate = dir.join(key.as_str());
            match fs::symlink_metadata(&candidate) {
                Ok(meta) => {
                    let kind = if meta.is_dir() {
                        EntryKind::Archive
                    } else {
                        EntryKind::Blob
                    };
                    debug!(%key, %kind, path = %candidate.display(), "located");
                    return Ok(StoredEntry::new(candidate, key.clone(), kind));
                }
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }

        Err(StoreError::NotFound(key.clone()))
    }

    /// Returns `true` if an entry is stored under `key`.
    pub fn contains(&self, key: &Key) -> StoreResult<bool> {
        match self.locate(key) {
            Ok(_) => Ok(true),
            Err(StoreError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }
}
