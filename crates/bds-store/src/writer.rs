use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use bds_crypto::{ContentSource, DigestEngine};
use bds_types::Key;
use tracing::{debug, warn};

use crate::error::{StoreError, StoreResult};

/// Remove the partial artifact at `path` after `err`, returning the error to
/// surface. A failed removal wraps both errors.
pub(crate) fn roll_back(
    err: StoreError,
    path: &Path,
    remove: impl FnOnce(&Path) -> io::Result<()>,
) -> StoreError {
    match remove(path) {
        Ok(()) => {
            warn!(path = %path.display(), error = %err, "rolled back partial entry");
            err
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => err,
        Err(cleanup) => {
            warn!(path = %path.display(), error = %err, cleanup = %cleanup, "rollback failed");
            StoreError::Rollback {
                source: Box::new(err),
                path: path.to_path_buf(),
                cleanup,
            }
        }
    }
}

/// Copy `source` from its start into `dir/key` in blocks of `block_size`.
///
/// An entry already at `dir/key` is left untouched. If copying fails the
/// partially written file is removed before the error is returned.
pub fn write_blob<S: ContentSource + ?Sized>(
    source: &mut S,
    dir: &Path,
    key: &Key,
    block_size: usize,
) -> StoreResult<PathBuf> {
    let path = dir.join(key.as_str());

    let file = match OpenOptions::new().write(true).create_new(true).open(&path) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
            debug!(%key, path = %path.display(), "blob already present");
            return Ok(path);
        }
        Err(e) => return Err(e.into()),
    };

    match copy_blocks(source, file, block_size) {
        Ok(written) => {
            debug!(%key, written, path = %path.display(), "blob written");
            Ok(path)
        }
        Err(err) => Err(roll_back(err, &path, |p| fs::remove_file(p))),
    }
}

fn copy_blocks<S: ContentSource + ?Sized>(
    source: &mut S,
    mut file: File,
    block_size: usize,
) -> StoreResult<u64> {
    DigestEngine::rewind(source)?;

    let mut buf = vec![0u8; block_size.max(1)];
    let mut written: u64 = 0;
    loop {
        let n = match source.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        };
        file.write_all(&buf[..n])?;
        written += n as u64;
    }
    file.sync_all()?;
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Seek, SeekFrom};

    /// Yields some bytes, then fails mid-stream.
    struct FailingSource {
        served: bool,
    }

    impl Read for FailingSource {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.served {
                return Err(io::Error::other("device unplugged"));
            }
            self.served = true;
            buf[..4].copy_from_slice(b"part");
            Ok(4)
        }
    }

    impl Seek for FailingSource {
        fn seek(&mut self, _pos: SeekFrom) -> io::Result<u64> {
            Ok(0)
        }
    }

    fn key(s: &str) -> Key {
        Key::parse(s).unwrap()
    }

    #[test]
    fn writes_whole_source_from_start() {
        let tmp = tempfile::tempdir().unwrap();
        let mut source = Cursor::new(b"hello balanced storage".to_vec());
        source.set_position(6);

        let path = write_blob(&mut source, tmp.path(), &key("k1"), 4).unwrap();
        assert_eq!(path, tmp.path().join("k1"));
        assert_eq!(fs::read(&path).unwrap(), b"hello balanced storage");
    }

    #[test]
    fn existing_blob_is_not_rewritten() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("k1"), b"original").unwrap();

        let mut source = Cursor::new(b"different".to_vec());
        let path = write_blob(&mut source, tmp.path(), &key("k1"), 4).unwrap();
        assert_eq!(fs::read(path).unwrap(), b"original");
    }

    #[test]
    fn failed_copy_removes_partial_file() {
        let tmp = tempfile::tempdir().unwrap();
        let mut source = FailingSource { served: false };

        let err = write_blob(&mut source, tmp.path(), &key("k1"), 4).unwrap_err();
        assert!(matches!(err, StoreError::Io(_)));
        assert!(!tmp.path().join("k1").exists());
    }

    #[test]
    fn rollback_of_missing_artifact_keeps_original_error() {
        let tmp = tempfile::tempdir().unwrap();
        let err = roll_back(
            StoreError::Archive("bad member".into()),
            &tmp.path().join("gone"),
            |p| fs::remove_file(p),
        );
        assert!(matches!(err, StoreError::Archive(_)));
    }

    #[test]
    fn failed_rollback_reports_both_errors() {
        let tmp = tempfile::tempdir().unwrap();
        let err = roll_back(
            StoreError::Archive("bad member".into()),
            tmp.path(),
            |_| Err(io::Error::other("busy")),
        );
        assert!(matches!(err, StoreError::Rollback { .. }));
        assert!(matches!(err.root_cause(), StoreError::Archive(_)));
    }
}
