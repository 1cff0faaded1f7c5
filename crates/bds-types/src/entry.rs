use std::fmt;
use std::path::{Path, PathBuf, MAIN_SEPARATOR};

use serde::{Deserialize, Serialize};

use crate::key::Key;

/// What a stored entry is on disk.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    /// A single file named by its key.
    Blob,
    /// A directory named by its key, holding extracted archive members.
    Archive,
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Blob => write!(f, "blob"),
            Self::Archive => write!(f, "archive"),
        }
    }
}

/// Result of a successful insert or lookup: where the entry lives and which
/// key it was stored under.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredEntry {
    /// Filesystem location of the blob file or archive directory.
    pub path: PathBuf,
    /// Content key, equal to the last component of `path`.
    pub key: Key,
    /// Blob or expanded archive.
    pub kind: EntryKind,
}

impl StoredEntry {
    /// Create a new stored entry record.
    pub fn new(path: impl Into<PathBuf>, key: Key, kind: EntryKind) -> Self {
        Self {
            path: path.into(),
            key,
            kind,
        }
    }

    /// Filesystem location of the entry.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns `true` for an expanded archive directory.
    pub fn is_archive(&self) -> bool {
        self.kind == EntryKind::Archive
    }

    /// The path as text; archive directories carry a trailing separator so
    /// both kinds can be told apart from the string alone.
    pub fn display_path(&self) -> String {
        let mut text = self.path.display().to_string();
        if self.is_archive() && !text.ends_with(MAIN_SEPARATOR) {
            text.push(MAIN_SEPARATOR);
        }
        text
    }
}

impl fmt::Display for StoredEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display_path())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> Key {
        Key::parse("abc_3").unwrap()
    }

    #[test]
    fn blob_path_has_no_trailing_separator() {
        let entry = StoredEntry::new("/store/a/abc_3", key(), EntryKind::Blob);
        assert_eq!(entry.display_path(), "/store/a/abc_3");
        assert!(!entry.is_archive());
    }

    #[cfg(unix)]
    #[test]
    fn archive_path_has_trailing_separator() {
        let entry = StoredEntry::new("/store/a/abc_3", key(), EntryKind::Archive);
        assert_eq!(entry.display_path(), "/store/a/abc_3/");
        assert_eq!(entry.to_string(), "/store/a/abc_3/");
        assert!(entry.is_archive());
    }

    #[test]
    fn entry_kind_display() {
        assert_eq!(EntryKind::Blob.to_string(), "blob");
        assert_eq!(EntryKind::Archive.to_string(), "archive");
    }

    #[test]
    fn serializes_as_path_key_kind() {
        let entry = StoredEntry::new("/store/a/abc_3", key(), EntryKind::Blob);
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["key"], "abc_3");
        assert_eq!(json["kind"], "blob");
        assert_eq!(json["path"], "/store/a/abc_3");
    }
}
