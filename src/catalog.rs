//! Catalog
//!
//! Registry of live tables, persisted as one metadata object per table.
//!
//! ## Responsibilities
//! - Discover existing tables on startup (list the metadata root)
//! - Restore each table's File Table from its `sizes`/`marks` objects
//! - Allocate a fresh key prefix per CREATE
//! - Track table lifecycle (create → drop)

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use bytes::Bytes;
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::{BucketLogError, Result};
use crate::format::{seal, unseal};
use crate::store::ObjectStore;
use crate::table::{validate_identifier, FileTable, Schema, Variant};

/// File extension of metadata objects
const METADATA_EXT: &str = ".meta";

// =============================================================================
// Table Metadata
// =============================================================================

/// Persisted definition of a table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableMeta {
    pub name: String,
    /// Key prefix of the table's files, ends with `/`
    pub prefix: String,
    pub variant: Variant,
    pub schema: Schema,
}

impl TableMeta {
    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(seal(&bincode::serialize(self)?))
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let meta: TableMeta = bincode::deserialize(unseal(bytes, "table metadata")?)?;
        // Re-run schema validation on what came off the wire
        Schema::new(meta.schema.columns().to_vec())?;
        Ok(meta)
    }
}

// =============================================================================
// Table Handle
// =============================================================================

/// A live table: its definition plus the lock-protected File Table
///
/// ## Concurrency:
/// - `files`: RwLock, writers (insert/truncate/drop) exclusive, readers shared
/// - `dropped`: set under the write lock; checked after every lock acquire
#[derive(Debug)]
pub struct Table {
    meta: TableMeta,
    files: RwLock<FileTable>,
    dropped: AtomicBool,
}

impl Table {
    fn new(meta: TableMeta, files: FileTable) -> Self {
        Self {
            meta,
            files: RwLock::new(files),
            dropped: AtomicBool::new(false),
        }
    }

    pub fn meta(&self) -> &TableMeta {
        &self.meta
    }

    pub fn name(&self) -> &str {
        &self.meta.name
    }

    pub fn schema(&self) -> &Schema {
        &self.meta.schema
    }

    pub fn variant(&self) -> Variant {
        self.meta.variant
    }

    /// Shared access to the File Table (`TableNotFound` once dropped)
    pub fn read(&self) -> Result<RwLockReadGuard<'_, FileTable>> {
        let guard = self.files.read();
        self.check_live()?;
        Ok(guard)
    }

    /// Exclusive access to the File Table (`TableNotFound` once dropped)
    pub fn write(&self) -> Result<RwLockWriteGuard<'_, FileTable>> {
        let guard = self.files.write();
        self.check_live()?;
        Ok(guard)
    }

    /// Mark dropped; caller holds the write lock
    pub(crate) fn mark_dropped(&self) {
        self.dropped.store(true, Ordering::SeqCst);
    }

    fn check_live(&self) -> Result<()> {
        if self.dropped.load(Ordering::SeqCst) {
            return Err(BucketLogError::TableNotFound(self.meta.name.clone()));
        }
        Ok(())
    }
}

// =============================================================================
// Catalog
// =============================================================================

/// Table registry
///
/// ## Concurrency:
/// - `tables`: RwLock held only for map lookups and updates, never while a
///   table lock is being acquired
/// - `next_suffix`: atomic counter mixed into fresh prefixes
#[derive(Debug)]
pub struct Catalog {
    data_root: String,
    metadata_root: String,
    tables: RwLock<HashMap<String, Arc<Table>>>,
    next_suffix: AtomicU64,
}

impl Catalog {
    /// Open the catalog, recovering every table found under the metadata root
    pub fn open(store: &dyn ObjectStore, config: &Config) -> Result<Self> {
        let catalog = Self {
            data_root: config.data_root.clone(),
            metadata_root: config.metadata_root.clone(),
            tables: RwLock::new(HashMap::new()),
            next_suffix: AtomicU64::new(0),
        };

        let keys = store.list(&format!("{}/", catalog.metadata_root))?;
        let mut tables = HashMap::new();

        for key in keys.iter().filter(|k| k.ends_with(METADATA_EXT)) {
            let meta = TableMeta::decode(&store.get(key)?)?;
            if catalog.metadata_key(&meta.name) != *key {
                return Err(BucketLogError::Corruption(format!(
                    "{}: metadata names table {:?}",
                    key, meta.name
                )));
            }

            let mut files = FileTable::new(meta.prefix.clone(), meta.variant, &meta.schema);
            files.restore(store)?;

            tracing::debug!(
                "Recovered table {} ({}, {} rows{})",
                meta.name,
                meta.variant,
                files.rows(),
                if files.is_dirty() { ", dirty" } else { "" }
            );
            tables.insert(meta.name.clone(), Arc::new(Table::new(meta, files)));
        }

        if !tables.is_empty() {
            tracing::info!("Catalog recovered {} tables", tables.len());
        }
        *catalog.tables.write() = tables;

        Ok(catalog)
    }

    /// Look up a live table
    pub fn get(&self, name: &str) -> Result<Arc<Table>> {
        self.tables
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| BucketLogError::TableNotFound(name.to_string()))
    }

    /// Register a new table and persist its metadata
    ///
    /// No data objects are created; they appear on the first insert.
    pub fn create(
        &self,
        store: &dyn ObjectStore,
        name: &str,
        schema: Schema,
        variant: Variant,
    ) -> Result<Arc<Table>> {
        validate_identifier("table", name)?;

        // Held across the metadata put so two creates of one name can't race
        let mut tables = self.tables.write();
        if tables.contains_key(name) {
            return Err(BucketLogError::TableExists(name.to_string()));
        }

        let meta = TableMeta {
            name: name.to_string(),
            prefix: self.fresh_prefix(name),
            variant,
            schema,
        };
        store.put(&self.metadata_key(name), Bytes::from(meta.encode()?))?;

        let files = FileTable::new(meta.prefix.clone(), meta.variant, &meta.schema);
        let table = Arc::new(Table::new(meta, files));
        tables.insert(name.to_string(), Arc::clone(&table));

        Ok(table)
    }

    /// Delete a table's metadata object and unregister it
    ///
    /// Caller holds the table's write lock and has already cleared its files.
    pub(crate) fn remove(&self, store: &dyn ObjectStore, table: &Table) -> Result<()> {
        store.delete(&self.metadata_key(table.name()))?;
        table.mark_dropped();

        let mut tables = self.tables.write();
        if let Some(current) = tables.get(table.name()) {
            if std::ptr::eq(Arc::as_ptr(current), table) {
                tables.remove(table.name());
            }
        }

        Ok(())
    }

    /// Names of all live tables, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tables.read().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.tables.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.read().is_empty()
    }

    /// Table prefixes under the data root that no live table owns
    ///
    /// These are left behind by a DROP that failed after deleting the
    /// metadata object, or by a crash during one.
    pub fn orphaned_prefixes(&self, store: &dyn ObjectStore) -> Result<BTreeSet<String>> {
        let root = format!("{}/", self.data_root);

        // List before snapshotting: a table is registered before its first
        // object exists, so anything listed here is either live or garbage.
        let keys = store.list(&root)?;
        let live: BTreeSet<String> = self
            .tables
            .read()
            .values()
            .map(|t| t.meta.prefix.clone())
            .collect();

        let orphans = keys
            .into_iter()
            .filter_map(|key| {
                let rest = key.strip_prefix(&root)?;
                let (dir, _) = rest.split_once('/')?;
                Some(format!("{}{}/", root, dir))
            })
            .filter(|prefix| !live.contains(prefix))
            .collect();

        Ok(orphans)
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    /// Metadata object key of a table
    fn metadata_key(&self, name: &str) -> String {
        format!("{}/{}{}", self.metadata_root, name, METADATA_EXT)
    }

    /// Unique prefix for a new table: `{data_root}/{name}.{nanos}{seq}/`
    fn fresh_prefix(&self, name: &str) -> String {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        let seq = self.next_suffix.fetch_add(1, Ordering::SeqCst);
        format!("{}/{}.{:x}{:04x}/", self.data_root, name, nanos, seq & 0xffff)
    }
}
