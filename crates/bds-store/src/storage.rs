use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use bds_crypto::{ContentSource, DigestEngine, HashAlgorithm};
use bds_types::{EntryKind, Key, KeyFormat, StoredEntry};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::allocator::Allocator;
use crate::archive::{expand_archive, ArchiveFormat, ZipFormat};
use crate::config::StoreConfig;
use crate::error::{StoreError, StoreResult};
use crate::locator::Locator;
use crate::remover::Remover;
use crate::writer::write_blob;

/// Content-addressed file store over a balanced directory tree.
///
/// Every entry is named by its [`Key`] and lives at
/// `root/c1[/c2[/c3...]]/<key>`, where `c1, c2, ...` are the leading
/// characters of the key. No directory below the root ever holds more than
/// `directory_limit` entries; when one fills up, new keys move one level
/// deeper.
///
/// Stores opened with [`BalancedStorage::open_with_archives`] (or given a
/// format via [`BalancedStorage::with_archive_format`]) can also expand
/// archives into `<key>/` directories.
///
/// The store assumes a single writer per root. Directory creation tolerates
/// concurrent creators, but capacity checks and rollbacks are not atomic
/// across processes.
pub struct BalancedStorage {
    root: PathBuf,
    config: StoreConfig,
    engine: DigestEngine,
    archive_format: Option<Box<dyn ArchiveFormat>>,
}

impl BalancedStorage {
    /// Open a store of plain blobs. Fails if the root is missing, is not a
    /// directory, or cannot be read and written.
    pub fn open(config: StoreConfig) -> StoreResult<Self> {
        config.validate()?;
        let root = validate_root(&config.root)?;
        let engine = DigestEngine::new(config.hash_algorithm, config.read_block_size);
        info!(
            root = %root.display(),
            directory_limit = config.directory_limit,
            algorithm = %config.hash_algorithm,
            "storage opened"
        );
        Ok(Self {
            root,
            config,
            engine,
            archive_format: None,
        })
    }

    /// Open a store that can also expand `.zip` archives.
    pub fn open_with_archives(config: StoreConfig) -> StoreResult<Self> {
        Ok(Self::open(config)?.with_archive_format(Box::new(ZipFormat)))
    }

    /// Enable archive expansion with the given format.
    pub fn with_archive_format(mut self, format: Box<dyn ArchiveFormat>) -> Self {
        self.archive_format = Some(format);
        self
    }

    /// Canonical absolute storage root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn directory_limit(&self) -> usize {
        self.config.directory_limit
    }

    pub fn read_block_size(&self) -> usize {
        self.config.read_block_size
    }

    pub fn hash_algorithm(&self) -> HashAlgorithm {
        self.config.hash_algorithm
    }

    pub fn key_format(&self) -> KeyFormat {
        self.config.key_format
    }

    pub fn max_archive_entries(&self) -> usize {
        self.config.effective_max_archive_entries()
    }

    /// Returns `true` if archives can be expanded.
    pub fn supports_archives(&self) -> bool {
        self.archive_format.is_some()
    }

    fn allocator(&self) -> Allocator<'_> {
        Allocator::new(&self.root, self.config.directory_limit)
    }

    fn locator(&self) -> Locator<'_> {
        Locator::new(&self.root)
    }

    fn remover(&self) -> Remover<'_> {
        Remover::new(&self.root)
    }

    /// Compute the key `source` would be stored under, without storing it.
    pub fn key_for<S: ContentSource + ?Sized>(&self, source: &mut S) -> StoreResult<Key> {
        Ok(self.engine.key(source, self.config.key_format)?)
    }

    /// Store the bytes of `source` as a blob.
    ///
    /// Adding content that is already stored, as a blob or an expanded
    /// archive, changes nothing and returns the existing entry wherever it
    /// sits in the tree.
    pub fn add_file<S: ContentSource + ?Sized>(&self, source: &mut S) -> StoreResult<StoredEntry> {
        let key = self.key_for(source)?;
        if let Some(entry) = self.existing(&key)? {
            debug!(%key, kind = %entry.kind, path = %entry.path.display(), "already stored");
            return Ok(entry);
        }

        let dir = self.allocator().allocate(&key)?;
        match write_blob(source, &dir, &key, self.config.read_block_size) {
            Ok(path) => {
                info!(%key, path = %path.display(), "blob stored");
                Ok(StoredEntry::new(path, key, EntryKind::Blob))
            }
            Err(err) => Err(self.prune_after_failure(&dir, err)),
        }
    }

    /// Expand the archive in `source` into a directory named by its key.
    ///
    /// A previous entry for the same content is replaced in place. Fails with a
    /// capacity error when the archive has more than
    /// [`max_archive_entries`](Self::max_archive_entries) members, leaving no
    /// directory behind.
    pub fn add_archive<S: ContentSource>(&self, source: &mut S) -> StoreResult<StoredEntry> {
        let format = self
            .archive_format
            .as_deref()
            .ok_or(StoreError::ArchiveUnsupported)?;

        let key = self.key_for(source)?;
        let dir = match self.existing(&key)? {
            Some(entry) => match entry.path.parent() {
                Some(parent) => parent.to_path_buf(),
                None => return Err(StoreError::UnknownPath(entry.path)),
            },
            None => self.allocator().allocate(&key)?,
        };

        match expand_archive(format, source, &dir, &key, self.max_archive_entries()) {
            Ok(path) => Ok(StoredEntry::new(path, key, EntryKind::Archive)),
            Err(err) => Err(self.prune_after_failure(&dir, err)),
        }
    }

    /// The entry already stored under `key`, at whatever depth.
    fn existing(&self, key: &Key) -> StoreResult<Option<StoredEntry>> {
        match self.locator().locate(key) {
            Ok(entry) => Ok(Some(entry)),
            Err(StoreError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Drop shard directories a failed insert left empty.
    fn prune_after_failure(&self, dir: &Path, err: StoreError) -> StoreError {
        if let Err(prune_err) = self.remover().prune(dir) {
            warn!(path = %dir.display(), error = %prune_err, "could not prune after failed insert");
        }
        err
    }

    /// Find the entry stored under `key`.
    pub fn lookup(&self, key: &Key) -> StoreResult<StoredEntry> {
        self.locator().locate(key)
    }

    /// Like [`lookup`](Self::lookup), for a key given as text.
    pub fn lookup_str(&self, key: &str) -> StoreResult<StoredEntry> {
        self.lookup(&Key::parse(key)?)
    }

    /// Returns `true` if an entry is stored under `key`.
    pub fn contains(&self, key: &Key) -> StoreResult<bool> {
        self.locator().contains(key)
    }

    /// Delete the entry stored under `key` and prune emptied directories.
    pub fn delete(&self, key: &Key) -> StoreResult<()> {
        let entry = self.locator().locate(key)?;
        self.remover().delete_path(&entry.path)
    }

    /// Delete the entry that `source`'s content is stored under.
    pub fn delete_by_source<S: ContentSource + ?Sized>(&self, source: &mut S) -> StoreResult<()> {
        let key = self.key_for(source)?;
        self.delete(&key)
    }

    /// Delete the entry at `path`, which must lie strictly inside the root.
    pub fn delete_path(&self, path: &Path) -> StoreResult<()> {
        self.remover().delete_path(path)
    }

    /// Every stored key, sorted.
    ///
    /// Shard directories have one-character names; anything else found in
    /// the tree is an entry, and expanded archives are not descended into.
    /// Files directly in the root are never entries.
    pub fn keys(&self) -> StoreResult<Vec<Key>> {
        let mut keys = Vec::new();
        let mut walker = WalkDir::new(&self.root)
            .min_depth(1)
            .sort_by_file_name()
            .into_iter();

        while let Some(entry) = walker.next() {
            let entry = entry.map_err(io::Error::from)?;
            let name = entry.file_name().to_string_lossy();
            let is_dir = entry.file_type().is_dir();

            if is_dir && name.chars().count() == 1 {
                continue;
            }
            if !is_dir && entry.depth() == 1 {
                debug!(path = %entry.path().display(), "skipping file outside the shard tree");
                continue;
            }
            if is_dir {
                walker.skip_current_dir();
            }
            match Key::parse(&name) {
                Ok(key) => keys.push(key),
                Err(e) => {
                    warn!(path = %entry.path().display(), error = %e, "skipping foreign entry")
                }
            }
        }

        keys.sort();
        Ok(keys)
    }
}

impl fmt::Debug for BalancedStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BalancedStorage")
            .field("root", &self.root)
            .field("directory_limit", &self.config.directory_limit)
            .field("archive_format", &self.archive_format.as_ref().map(|a| a.name()))
            .finish()
    }
}

/// Check that `root` is an existing, readable and writable directory and
/// return its canonical form.
fn validate_root(root: &Path) -> StoreResult<PathBuf> {
    let access = |source: io::Error| StoreError::Access {
        path: root.to_path_buf(),
        source,
    };

    let meta = match fs::metadata(root) {
        Ok(meta) => meta,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(StoreError::Configuration {
                path: root.to_path_buf(),
                reason: "not found".into(),
            });
        }
        Err(e) => return Err(access(e)),
    };
    if !meta.is_dir() {
        return Err(StoreError::Configuration {
            path: root.to_path_buf(),
            reason: "is not a directory".into(),
        });
    }

    let canonical = fs::canonicalize(root).map_err(access)?;
    fs::read_dir(&canonical).map_err(access)?;
    tempfile::tempfile_in(&canonical).map_err(access)?;
    Ok(canonical)
}
