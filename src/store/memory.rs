//! In-memory object store
//!
//! BTreeMap-based bucket with RwLock for concurrency.

use std::collections::{BTreeMap, BTreeSet};
use std::ops::Bound;

use bytes::{Bytes, BytesMut};
use parking_lot::RwLock;

use crate::error::{BucketLogError, Result};

use super::{validate_key, ObjectStore};

/// Process-local bucket
///
/// Ordered keys make prefix listing a range scan. All operations take the
/// lock for their whole duration, which gives read-after-write consistency.
#[derive(Debug, Default)]
pub struct MemoryStore {
    objects: RwLock<BTreeMap<String, BytesMut>>,
}

impl MemoryStore {
    /// Create an empty bucket
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of objects in the whole bucket
    pub fn len(&self) -> usize {
        self.objects.read().len()
    }

    /// True if the bucket holds no objects
    pub fn is_empty(&self) -> bool {
        self.objects.read().is_empty()
    }

    /// Total bytes stored across all objects
    pub fn total_bytes(&self) -> usize {
        self.objects.read().values().map(|v| v.len()).sum()
    }
}

impl ObjectStore for MemoryStore {
    fn put(&self, key: &str, bytes: Bytes) -> Result<()> {
        validate_key(key)?;
        let mut buf = BytesMut::with_capacity(bytes.len());
        buf.extend_from_slice(&bytes);
        self.objects.write().insert(key.to_string(), buf);
        Ok(())
    }

    fn append(&self, key: &str, bytes: &[u8]) -> Result<()> {
        validate_key(key)?;
        self.objects
            .write()
            .entry(key.to_string())
            .or_default()
            .extend_from_slice(bytes);
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Bytes> {
        self.objects
            .read()
            .get(key)
            .map(|buf| Bytes::copy_from_slice(buf))
            .ok_or_else(|| BucketLogError::ObjectNotFound(key.to_string()))
    }

    fn size(&self, key: &str) -> Result<Option<u64>> {
        Ok(self.objects.read().get(key).map(|buf| buf.len() as u64))
    }

    fn list(&self, prefix: &str) -> Result<BTreeSet<String>> {
        let objects = self.objects.read();
        let keys = objects
            .range::<str, _>((Bound::Included(prefix), Bound::Unbounded))
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, _)| key.clone())
            .collect();
        Ok(keys)
    }

    fn delete(&self, key: &str) -> Result<()> {
        self.objects.write().remove(key);
        Ok(())
    }

    fn delete_prefix(&self, prefix: &str) -> Result<usize> {
        let mut objects = self.objects.write();
        let before = objects.len();
        objects.retain(|key, _| !key.starts_with(prefix));
        Ok(before - objects.len())
    }
}
