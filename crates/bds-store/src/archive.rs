use std::fmt;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use bds_crypto::{ContentSource, DigestEngine};
use bds_types::Key;
use tracing::{debug, info};
use zip::result::ZipError;
use zip::ZipArchive;

use crate::error::{CapacityError, StoreError, StoreResult};
use crate::writer::roll_back;

/// Sequential access to the members of an opened archive.
pub trait ArchiveReader {
    /// Extract the next member, in the archive's stored order, below `dest`
    /// and return where it landed. `Ok(None)` once every member is out.
    ///
    /// Members whose names would land outside `dest` must be rejected with
    /// [`StoreError::PathScope`].
    fn extract_next(&mut self, dest: &Path) -> StoreResult<Option<PathBuf>>;
}

/// An archive container format the store can expand.
pub trait ArchiveFormat: Send + Sync + fmt::Debug {
    /// Short format name for logs.
    fn name(&self) -> &str;

    /// Open `source` (already rewound) for sequential extraction.
    fn open<'a>(
        &self,
        source: &'a mut dyn ContentSource,
    ) -> StoreResult<Box<dyn ArchiveReader + 'a>>;
}

/// `.zip` archives.
#[derive(Clone, Copy, Debug, Default)]
pub struct ZipFormat;

impl ArchiveFormat for ZipFormat {
    fn name(&self) -> &str {
        "zip"
    }

    fn open<'a>(
        &self,
        source: &'a mut dyn ContentSource,
    ) -> StoreResult<Box<dyn ArchiveReader + 'a>> {
        let archive = ZipArchive::new(source).map_err(zip_error)?;
        Ok(Box::new(ZipMembers { archive, next: 0 }))
    }
}

struct ZipMembers<'a> {
    archive: ZipArchive<&'a mut dyn ContentSource>,
    next: usize,
}

impl ArchiveReader for ZipMembers<'_> {
    fn extract_next(&mut self, dest: &Path) -> StoreResult<Option<PathBuf>> {
        if self.next >= self.archive.len() {
            return Ok(None);
        }
        let mut member = self.archive.by_index(self.next).map_err(zip_error)?;
        self.next += 1;

        let Some(relative) = member.enclosed_name() else {
            return Err(StoreError::PathScope {
                path: dest.join(member.name()),
                root: dest.to_path_buf(),
            });
        };
        let out = dest.join(relative);

        if member.is_dir() {
            fs::create_dir_all(&out)?;
        } else {
            if let Some(parent) = out.parent() {
                fs::create_dir_all(parent)?;
            }
            let mut file = File::create(&out)?;
            io::copy(&mut member, &mut file)?;
        }
        Ok(Some(out))
    }
}

fn zip_error(err: ZipError) -> StoreError {
    match err {
        ZipError::Io(e) => StoreError::Io(e),
        other => StoreError::Archive(other.to_string()),
    }
}

/// Expand the archive in `source` into a fresh `dir/key` directory.
///
/// Whatever was stored at `dir/key` before is removed first. At most
/// `max_entries` members are accepted. On any failure the whole `dir/key`
/// tree is removed before the error is returned.
pub fn expand_archive<S: ContentSource>(
    format: &dyn ArchiveFormat,
    source: &mut S,
    dir: &Path,
    key: &Key,
    max_entries: usize,
) -> StoreResult<PathBuf> {
    let target = dir.join(key.as_str());
    clear_previous(&target)?;
    fs::create_dir(&target)?;

    match extract_members(format, source, &target, max_entries) {
        Ok(members) => {
            info!(
                %key,
                format = format.name(),
                members,
                path = %target.display(),
                "archive expanded"
            );
            Ok(target)
        }
        Err(err) => Err(roll_back(err, &target, |p| fs::remove_dir_all(p))),
    }
}

fn clear_previous(target: &Path) -> StoreResult<()> {
    match fs::symlink_metadata(target) {
        Ok(meta) if meta.is_dir() => {
            debug!(path = %target.display(), "replacing previous expansion");
            fs::remove_dir_all(target)?;
        }
        Ok(_) => {
            debug!(path = %target.display(), "replacing previous blob");
            fs::remove_file(target)?;
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(e.into()),
    }
    Ok(())
}

fn extract_members<S: ContentSource>(
    format: &dyn ArchiveFormat,
    source: &mut S,
    target: &Path,
    max_entries: usize,
) -> StoreResult<usize> {
    DigestEngine::rewind(source)?;
    let mut reader = format.open(source)?;

    let mut members = 0usize;
    while let Some(path) = reader.extract_next(target)? {
        members += 1;
        debug!(member = %path.display(), members, "extracted");
        if members > max_entries {
            return Err(CapacityError::TooManyArchiveEntries {
                limit: max_entries,
                seen: members,
            }
            .into());
        }
    }
    Ok(members)
}
