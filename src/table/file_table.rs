//! File Table
//!
//! Per-table manifest mapping file roles to object keys, with the committed
//! byte length of every file, the row count and (for `Log`) the marks.

use std::collections::BTreeMap;

use bytes::Bytes;

use crate::error::{BucketLogError, Result};
use crate::format::{decode_marks, MarkEntry, SizesRecord};
use crate::store::ObjectStore;

use super::{Role, Schema, Variant};

/// Role → key manifest of one table
///
/// ## State
/// - `committed`: byte length of each file that readers may trust
/// - `initialized`: every role key exists in the store
/// - `dirty`: an insert failed after it started writing; bytes past the
///   committed lengths may be garbage until the table is truncated
#[derive(Debug, Clone)]
pub struct FileTable {
    /// Key prefix of the table, ends with `/`
    prefix: String,

    /// File layout
    variant: Variant,

    /// Every role, data roles first, `Sizes` last
    roles: Vec<Role>,

    /// Column roles in schema order (mark offsets follow this order)
    column_roles: Vec<Role>,

    /// Committed byte length per role (`Sizes` excluded)
    committed: BTreeMap<Role, u64>,

    /// Committed rows
    rows: u64,

    /// Committed marks (`Log` only)
    marks: Vec<MarkEntry>,

    initialized: bool,
    dirty: bool,
}

impl FileTable {
    /// Create an empty manifest; nothing is written to the store
    pub fn new(prefix: impl Into<String>, variant: Variant, schema: &Schema) -> Self {
        let mut prefix = prefix.into();
        if !prefix.ends_with('/') {
            prefix.push('/');
        }

        let roles = variant.roles(schema);
        let column_roles = roles
            .iter()
            .filter(|r| matches!(r, Role::Column(_)))
            .cloned()
            .collect();

        Self {
            prefix,
            variant,
            roles,
            column_roles,
            committed: BTreeMap::new(),
            rows: 0,
            marks: Vec::new(),
            initialized: false,
            dirty: false,
        }
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn variant(&self) -> Variant {
        self.variant
    }

    pub fn roles(&self) -> &[Role] {
        &self.roles
    }

    /// Object key of a role
    pub fn key(&self, role: &Role) -> String {
        format!("{}{}", self.prefix, role.file_name())
    }

    /// Committed byte length of a role
    pub fn committed_len(&self, role: &Role) -> u64 {
        self.committed.get(role).copied().unwrap_or(0)
    }

    pub fn rows(&self) -> u64 {
        self.rows
    }

    pub fn marks(&self) -> &[MarkEntry] {
        &self.marks
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Flag the table after a failed write
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Re-examine a dirty table against the store
    ///
    /// Clears the flag when every stored file is exactly at its committed
    /// length, as after an append that failed without storing anything.
    /// Returns whether the table is still dirty.
    pub fn recheck_dirty(&mut self, store: &dyn ObjectStore) -> Result<bool> {
        if !self.dirty {
            return Ok(false);
        }

        if self.stray_roles(store)?.is_empty() {
            tracing::info!("{}: stored files match committed lengths, clearing dirty flag", self.prefix);
            self.dirty = false;
        }

        Ok(self.dirty)
    }

    /// Roles whose stored length differs from the committed length
    ///
    /// `Sizes` is rewritten whole on every insert and is never compared.
    pub fn stray_roles(&self, store: &dyn ObjectStore) -> Result<Vec<Role>> {
        let mut stray = Vec::new();

        for role in self.roles.iter().filter(|r| **r != Role::Sizes) {
            let key = self.key(role);
            let stored = store.size(&key)?.unwrap_or(0);
            let committed = self.committed_len(role);
            if stored != committed {
                tracing::warn!("{}: stored {} bytes, committed {}", key, stored, committed);
                stray.push(role.clone());
            }
        }

        Ok(stray)
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Create every missing role key as an empty object
    ///
    /// Idempotent: existing objects are left untouched, so a second call
    /// creates nothing. Returns the number of objects created.
    pub fn ensure_initialized(&mut self, store: &dyn ObjectStore) -> Result<usize> {
        if self.initialized {
            return Ok(0);
        }

        let existing = store.list(&self.prefix)?;
        let mut created = 0;

        for role in &self.roles {
            let key = self.key(role);
            if !existing.contains(&key) {
                store.put(&key, Bytes::new())?;
                created += 1;
            }
        }

        self.initialized = true;
        tracing::debug!("Initialized file set {} ({} objects created)", self.prefix, created);
        Ok(created)
    }

    /// Advance offsets after an insert of `rows` rows
    ///
    /// `lengths` holds the bytes appended per data role. For `Log` tables a
    /// mark entry pointing at the pre-insert offsets is appended and
    /// returned.
    pub fn record_insert(&mut self, rows: u64, lengths: &[(Role, u64)]) -> Option<MarkEntry> {
        let mark = self.variant.has_marks().then(|| MarkEntry {
            row_offset: self.rows,
            rows,
            offsets: self
                .column_roles
                .iter()
                .map(|role| self.committed_len(role))
                .collect(),
        });

        for (role, len) in lengths {
            *self.committed.entry(role.clone()).or_insert(0) += len;
        }

        if let Some(mark) = &mark {
            *self.committed.entry(Role::Marks).or_insert(0) +=
                MarkEntry::encoded_len(self.column_roles.len()) as u64;
            self.marks.push(mark.clone());
        }

        self.rows += rows;
        mark
    }

    /// Undo the last `record_insert` after its writes failed
    pub fn revert_insert(&mut self, rows: u64, lengths: &[(Role, u64)]) {
        for (role, len) in lengths {
            if let Some(committed) = self.committed.get_mut(role) {
                *committed = committed.saturating_sub(*len);
            }
        }

        if self.variant.has_marks() && self.marks.pop().is_some() {
            if let Some(committed) = self.committed.get_mut(&Role::Marks) {
                *committed =
                    committed.saturating_sub(MarkEntry::encoded_len(self.column_roles.len()) as u64);
            }
        }

        self.rows = self.rows.saturating_sub(rows);
    }

    /// Sizes record describing the committed state
    pub fn sizes_record(&self) -> SizesRecord {
        SizesRecord {
            rows: self.rows,
            files: self
                .roles
                .iter()
                .filter(|r| **r != Role::Sizes)
                .map(|r| (r.file_name(), self.committed_len(r)))
                .collect(),
        }
    }

    /// Delete every object under the prefix and reset to empty
    ///
    /// Safe on an already empty table. Returns the number of objects deleted.
    /// A failed delete leaves the table dirty until a retry succeeds.
    pub fn clear(&mut self, store: &dyn ObjectStore) -> Result<usize> {
        let deleted = match store.delete_prefix(&self.prefix) {
            Ok(deleted) => deleted,
            Err(e) => {
                self.dirty = true;
                return Err(e);
            }
        };

        self.committed.clear();
        self.rows = 0;
        self.marks.clear();
        self.initialized = false;
        self.dirty = false;

        Ok(deleted)
    }

    /// Rebuild committed state from the `sizes` and `marks` objects
    ///
    /// Files whose stored length differs from the committed length mark the
    /// table dirty.
    pub fn restore(&mut self, store: &dyn ObjectStore) -> Result<()> {
        let sizes = match store.get_opt(&self.key(&Role::Sizes))? {
            Some(bytes) => SizesRecord::decode(&bytes)?,
            None => {
                // Never written, or truncated: nothing to restore
                return Ok(());
            }
        };

        self.initialized = true;
        self.rows = sizes.rows;
        self.committed = self
            .roles
            .iter()
            .filter(|r| **r != Role::Sizes)
            .map(|r| (r.clone(), sizes.file_len(&r.file_name())))
            .collect();

        if self.variant.has_marks() {
            let bytes = self.read_committed(store, &Role::Marks)?;
            self.marks = decode_marks(&bytes, self.column_roles.len())?;

            let marked_rows = self
                .marks
                .iter()
                .try_fold(0u64, |acc, m| acc.checked_add(m.rows))
                .ok_or_else(|| {
                    BucketLogError::Corruption(format!("{}: marked row count overflows", self.prefix))
                })?;
            if marked_rows != self.rows {
                return Err(BucketLogError::Corruption(format!(
                    "{}: marks cover {} rows, sizes record {}",
                    self.prefix, marked_rows, self.rows
                )));
            }
        }

        if !self.stray_roles(store)?.is_empty() {
            tracing::warn!("{}: uncommitted bytes found, marking table dirty", self.prefix);
            self.dirty = true;
        }

        Ok(())
    }

    /// Fetch the committed bytes of a role
    ///
    /// Bytes past the committed length are ignored; an object shorter than
    /// its committed length is corruption.
    pub fn read_committed(&self, store: &dyn ObjectStore, role: &Role) -> Result<Bytes> {
        let committed = self.committed_len(role);
        if committed == 0 {
            return Ok(Bytes::new());
        }

        let key = self.key(role);
        let bytes = match store.get(&key) {
            Ok(bytes) => bytes,
            Err(BucketLogError::ObjectNotFound(_)) => {
                return Err(BucketLogError::Corruption(format!(
                    "{}: missing object with {} committed bytes",
                    key, committed
                )))
            }
            Err(e) => return Err(e),
        };

        if (bytes.len() as u64) < committed {
            return Err(BucketLogError::Corruption(format!(
                "{}: object has {} bytes, committed {}",
                key,
                bytes.len(),
                committed
            )));
        }

        Ok(bytes.slice(..committed as usize))
    }
}
