//! Local directory object store
//!
//! A directory on the local filesystem acting as a bucket. Each key maps to
//! a file at the same relative path, so `data/t.1/marks` lives at
//! `{root}/data/t.1/marks`.

use std::collections::BTreeSet;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;

use crate::error::{BucketLogError, Result};

use super::{validate_key, ObjectStore};

/// Directory under the root holding in-flight `put` payloads (never listed)
const STAGING_DIR: &str = ".staging";

/// Bucket backed by a local directory
///
/// `put` writes to a staging file and renames it into place, so readers
/// never observe a half-written replacement. `append` writes through to
/// the target file.
#[derive(Debug)]
pub struct LocalStore {
    /// Bucket root directory
    root: PathBuf,

    /// Counter for unique staging file names
    next_staging_id: AtomicU64,
}

impl LocalStore {
    /// Open or create a bucket rooted at `root`
    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(root.join(STAGING_DIR)).map_err(|e| unavailable(&root, e))?;
        tracing::debug!("Opened local bucket at {}", root.display());

        Ok(Self {
            root,
            next_staging_id: AtomicU64::new(0),
        })
    }

    /// Get the bucket root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    /// Filesystem path of a key
    fn path_of(&self, key: &str) -> PathBuf {
        key.split('/').fold(self.root.clone(), |path, seg| path.join(seg))
    }

    /// Create the parent directory of an object path
    fn ensure_parent(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| unavailable(parent, e))?;
        }
        Ok(())
    }

    /// Remove directories left empty after deleting `keys`
    ///
    /// Only directories whose whole subtree lies under `prefix` are touched;
    /// one that is not empty is kept.
    fn prune_dirs(&self, keys: &BTreeSet<String>, prefix: &str) {
        let mut dirs = BTreeSet::new();
        for key in keys {
            let mut end = key.len();
            while let Some(pos) = key[..end].rfind('/') {
                let dir = &key[..=pos];
                if !dir.starts_with(prefix) {
                    break;
                }
                dirs.insert(dir.to_string());
                end = pos;
            }
        }

        // Children before parents
        let mut dirs: Vec<String> = dirs.into_iter().collect();
        dirs.sort_by(|a, b| b.len().cmp(&a.len()));

        for dir in dirs {
            let path = self.path_of(dir.trim_end_matches('/'));
            match fs::remove_dir(&path) {
                Ok(()) => tracing::debug!("Removed empty directory {}", path.display()),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => tracing::debug!("Kept directory {}: {}", path.display(), e),
            }
        }
    }

    /// Recursively collect keys under `dir`, where `dir` corresponds to `key_prefix`
    fn walk(&self, dir: &Path, key_prefix: &str, prefix: &str, out: &mut BTreeSet<String>) -> Result<()> {
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(unavailable(dir, e)),
        };

        for entry in entries {
            let entry = entry.map_err(|e| unavailable(dir, e))?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if key_prefix.is_empty() && name == STAGING_DIR {
                continue;
            }

            let key = format!("{}{}", key_prefix, name);
            let file_type = entry.file_type().map_err(|e| unavailable(&entry.path(), e))?;

            if file_type.is_dir() {
                // Only descend where the subtree can still match the prefix
                let sub_prefix = format!("{}/", key);
                if prefix.starts_with(&sub_prefix) || sub_prefix.starts_with(prefix) {
                    self.walk(&entry.path(), &sub_prefix, prefix, out)?;
                }
            } else if key.starts_with(prefix) {
                out.insert(key);
            }
        }

        Ok(())
    }
}

impl ObjectStore for LocalStore {
    fn put(&self, key: &str, bytes: Bytes) -> Result<()> {
        validate_key(key)?;
        let path = self.path_of(key);
        self.ensure_parent(&path)?;

        let id = self.next_staging_id.fetch_add(1, Ordering::SeqCst);
        let staging = self
            .root
            .join(STAGING_DIR)
            .join(format!("{}-{}", std::process::id(), id));

        let write = || -> io::Result<()> {
            let mut file = fs::File::create(&staging)?;
            file.write_all(&bytes)?;
            file.sync_data()?;
            fs::rename(&staging, &path)
        };

        write().map_err(|e| {
            let _ = fs::remove_file(&staging);
            unavailable(&path, e)
        })
    }

    fn append(&self, key: &str, bytes: &[u8]) -> Result<()> {
        validate_key(key)?;
        let path = self.path_of(key);
        self.ensure_parent(&path)?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| unavailable(&path, e))?;
        file.write_all(bytes).map_err(|e| unavailable(&path, e))?;
        file.sync_data().map_err(|e| unavailable(&path, e))?;

        Ok(())
    }

    fn get(&self, key: &str) -> Result<Bytes> {
        validate_key(key)?;
        let path = self.path_of(key);

        match fs::read(&path) {
            Ok(data) => Ok(Bytes::from(data)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(BucketLogError::ObjectNotFound(key.to_string()))
            }
            Err(e) => Err(unavailable(&path, e)),
        }
    }

    fn size(&self, key: &str) -> Result<Option<u64>> {
        validate_key(key)?;
        let path = self.path_of(key);

        match fs::metadata(&path) {
            Ok(meta) if meta.is_file() => Ok(Some(meta.len())),
            Ok(_) => Ok(None),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(unavailable(&path, e)),
        }
    }

    fn list(&self, prefix: &str) -> Result<BTreeSet<String>> {
        let mut keys = BTreeSet::new();
        self.walk(&self.root, "", prefix, &mut keys)?;
        Ok(keys)
    }

    fn delete(&self, key: &str) -> Result<()> {
        validate_key(key)?;
        let path = self.path_of(key);

        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(unavailable(&path, e)),
        }
    }

    fn delete_prefix(&self, prefix: &str) -> Result<usize> {
        let keys = self.list(prefix)?;
        for key in &keys {
            self.delete(key)?;
        }

        self.prune_dirs(&keys, prefix);
        Ok(keys.len())
    }
}

fn unavailable(path: &Path, err: io::Error) -> BucketLogError {
    BucketLogError::StoreUnavailable(format!("{}: {}", path.display(), err))
}
