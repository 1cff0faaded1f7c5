use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use tracing::{debug, info};

use crate::error::{StoreError, StoreResult};

/// Resolve `.` and `..` components without touching the filesystem.
pub(crate) fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() && !out.has_root() {
                    out.push(component);
                }
            }
            other => out.push(other),
        }
    }
    out
}

/// Deletes entries below the storage root and prunes the shard directories
/// they leave empty. The root itself is never removed.
#[derive(Clone, Debug)]
pub struct Remover<'a> {
    root: &'a Path,
}

impl<'a> Remover<'a> {
    pub fn new(root: &'a Path) -> Self {
        Self { root }
    }

    /// Lexically normalized `path`, if it is a strict descendant of the root.
    fn scoped(&self, path: &Path) -> StoreResult<PathBuf> {
        let normalized = normalize(path);
        if normalized.starts_with(self.root) && normalized != self.root {
            Ok(normalized)
        } else {
            Err(StoreError::PathScope {
                path: path.to_path_buf(),
                root: self.root.to_path_buf(),
            })
        }
    }

    /// Delete the file or directory tree at `path`, then prune its ancestors.
    pub fn delete_path(&self, path: &Path) -> StoreResult<()> {
        let path = self.scoped(path)?;
        let meta = match fs::symlink_metadata(&path) {
            Ok(meta) => meta,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(StoreError::UnknownPath(path));
            }
            Err(e) => return Err(e.into()),
        };

        if meta.is_dir() {
            fs::remove_dir_all(&path)?;
        } else {
            fs::remove_file(&path)?;
        }
        info!(path = %path.display(), "entry deleted");

        if let Some(parent) = path.parent() {
            self.prune(parent)?;
        }
        Ok(())
    }

    /// Remove `path` and each ancestor in turn while they are empty,
    /// stopping at the first non-empty directory or at the root.
    pub fn prune(&self, path: &Path) -> StoreResult<()> {
        let mut current = normalize(path);

        loop {
            if current == self.root || !current.starts_with(self.root) {
                return Ok(());
            }
            match fs::read_dir(&current) {
                Ok(mut entries) => {
                    if entries.next().is_some() {
                        return Ok(());
                    }
                    match fs::remove_dir(&current) {
                        Ok(()) => debug!(path = %current.display(), "pruned empty directory"),
                        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                        Err(e) => return Err(e.into()),
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
            if !current.pop() {
                return Ok(());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_resolves_dots() {
        assert_eq!(normalize(Path::new("/a/./b/../c")), PathBuf::from("/a/c"));
        assert_eq!(normalize(Path::new("/a/b/../../..")), PathBuf::from("/"));
    }

    #[test]
    fn deleting_only_entry_prunes_to_root() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path();
        let leaf = root.join("a").join("2");
        fs::create_dir_all(&leaf).unwrap();
        fs::write(leaf.join("a2"), b"x").unwrap();

        Remover::new(root).delete_path(&leaf.join("a2")).unwrap();
        assert!(!root.join("a").exists());
        assert!(root.is_dir());
    }

    #[test]
    fn sibling_keeps_parent() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path();
        let a = root.join("a");
        fs::create_dir(&a).unwrap();
        fs::write(a.join("a1"), b"1").unwrap();
        fs::write(a.join("a3"), b"3").unwrap();

        Remover::new(root).delete_path(&a.join("a1")).unwrap();
        assert!(a.is_dir());
        assert!(a.join("a3").exists());
    }

    #[test]
    fn deletes_directory_trees() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path();
        let archive = root.join("b").join("b1");
        fs::create_dir_all(archive.join("nested")).unwrap();
        fs::write(archive.join("nested").join("f"), b"x").unwrap();

        Remover::new(root).delete_path(&archive).unwrap();
        assert!(!root.join("b").exists());
    }

    #[test]
    fn outside_root_is_path_scope_error() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("store");
        fs::create_dir(&root).unwrap();
        fs::write(tmp.path().join("outside"), b"x").unwrap();

        let remover = Remover::new(&root);
        for path in [
            tmp.path().join("outside"),
            root.join("..").join("outside"),
            root.clone(),
        ] {
            let err = remover.delete_path(&path).unwrap_err();
            assert!(matches!(err, StoreError::PathScope { .. }), "{path:?}");
        }
        assert!(tmp.path().join("outside").exists());
    }

    #[test]
    fn missing_path_is_unknown() {
        let tmp = tempfile::tempdir().unwrap();
        let err = Remover::new(tmp.path())
            .delete_path(&tmp.path().join("nope"))
            .unwrap_err();
        assert!(matches!(err, StoreError::UnknownPath(_)));
    }

    #[test]
    fn prune_skips_missing_levels_and_stops_at_root() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path();
        fs::create_dir(root.join("a")).unwrap();

        Remover::new(root)
            .prune(&root.join("a").join("b").join("c"))
            .unwrap();
        assert!(!root.join("a").exists());
        assert!(root.is_dir());
    }

    #[test]
    fn prune_never_walks_above_root() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("store");
        fs::create_dir(&root).unwrap();
        let sibling = tmp.path().join("empty-sibling");
        fs::create_dir(&sibling).unwrap();

        Remover::new(&root).prune(&sibling).unwrap();
        assert!(sibling.is_dir());
    }
}
