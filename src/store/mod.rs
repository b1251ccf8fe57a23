//! Object Store Module
//!
//! Capability interface over a key-addressed blob store.
//!
//! ## Responsibilities
//! - Put, append, get and delete objects by string key
//! - List keys by prefix (used to count and verify table objects)
//! - Surface transport failures as `StoreUnavailable`, never retry
//!
//! ## Consistency Contract
//! Implementations must be read-after-write consistent: an `append` or
//! `put` is visible to the next `get`/`list` on any thread. The engine
//! counts objects with `list`, so a store that only offers eventual
//! consistency needs a confirm-by-listing layer in front of it.
//!
//! ## Backends
//! - [`MemoryStore`]: process-local bucket (tests, benches)
//! - [`LocalStore`]: a directory acting as a bucket, keys are relative paths

mod local;
mod memory;

use std::collections::BTreeSet;
use std::fmt;

use bytes::Bytes;

use crate::error::{BucketLogError, Result};

pub use local::LocalStore;
pub use memory::MemoryStore;

/// Key-addressed blob store used by the engine
///
/// Keys use `/` as separator. `list` and `delete_prefix` match raw string
/// prefixes, so callers pass prefixes ending in `/` to scope a directory.
pub trait ObjectStore: Send + Sync + fmt::Debug {
    /// Create or replace an object
    fn put(&self, key: &str, bytes: Bytes) -> Result<()>;

    /// Append to an object, creating it if absent
    fn append(&self, key: &str, bytes: &[u8]) -> Result<()>;

    /// Read a whole object (`ObjectNotFound` if absent)
    fn get(&self, key: &str) -> Result<Bytes>;

    /// List every key starting with `prefix`
    fn list(&self, prefix: &str) -> Result<BTreeSet<String>>;

    /// Delete an object; deleting a missing key succeeds
    fn delete(&self, key: &str) -> Result<()>;

    /// Delete every object under `prefix`, returning how many were removed
    fn delete_prefix(&self, prefix: &str) -> Result<usize> {
        let keys = self.list(prefix)?;
        for key in &keys {
            self.delete(key)?;
        }
        Ok(keys.len())
    }

    /// Byte length of an object, `None` if absent
    fn size(&self, key: &str) -> Result<Option<u64>> {
        Ok(self.get_opt(key)?.map(|bytes| bytes.len() as u64))
    }

    /// Read an object, mapping a missing key to `None`
    fn get_opt(&self, key: &str) -> Result<Option<Bytes>> {
        match self.get(key) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(BucketLogError::ObjectNotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

/// Reject keys that could escape a bucket or address nothing
pub(crate) fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() || key.starts_with('/') || key.ends_with('/') {
        return Err(BucketLogError::InvalidKey(key.to_string()));
    }

    if key.split('/').any(|seg| seg.is_empty() || seg == "." || seg == "..") {
        return Err(BucketLogError::InvalidKey(key.to_string()));
    }

    Ok(())
}
