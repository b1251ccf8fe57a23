//! Engine Module
//!
//! The log engine core that turns table operations into object-store calls.
//!
//! ## Responsibilities
//! - Route CREATE/INSERT/SELECT/TRUNCATE/DROP to the catalog and file tables
//! - Encode insert batches per variant and append them
//! - Decode committed bytes back into rows in insertion order
//! - Keep the object count of every table at its variant's fixed total

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use bytes::Bytes;

use crate::catalog::{Catalog, Table};
use crate::command::Command;
use crate::config::Config;
use crate::error::{BucketLogError, Result};
use crate::format::{self, MarkEntry};
use crate::store::{LocalStore, ObjectStore};
use crate::table::{ColumnDef, FileTable, Role, Row, Schema, Value, Variant};

/// Encoded insert batch: bytes to append per data role
type Payload = Vec<(Role, Vec<u8>)>;

/// The main storage engine
///
/// ## Concurrency Model: Single-Writer / Multiple-Reader per table
///
/// - **Writes** (insert/truncate/drop): take the table's write lock
///   - Only ONE mutation per table at a time
///   - Tables are independent; writes to different tables run in parallel
///
/// - **Reads** (select): take the table's read lock
///   - Many concurrent readers per table
///   - Never overlap a truncate or drop of the same table
///
/// Rows are validated and encoded before any lock is taken, so a rejected
/// batch never touches the store.
#[derive(Debug)]
pub struct Engine {
    /// Engine configuration
    config: Config,

    /// Bucket holding every table's objects
    store: Arc<dyn ObjectStore>,

    /// Live tables
    catalog: Catalog,
}

impl Engine {
    /// Open an engine over the local bucket at `config.bucket_dir`
    ///
    /// On startup:
    /// 1. Validate the config
    /// 2. Open/create the bucket directory
    /// 3. Recover tables from their metadata objects
    pub fn open(config: Config) -> Result<Self> {
        config.validate()?;
        let store = LocalStore::open(&config.bucket_dir)?;
        Self::with_store(config, Arc::new(store))
    }

    /// Open an engine over any object store
    pub fn with_store(config: Config, store: Arc<dyn ObjectStore>) -> Result<Self> {
        config.validate()?;
        let catalog = Catalog::open(store.as_ref(), &config)?;

        Ok(Self {
            config,
            store,
            catalog,
        })
    }

    /// Execute a command
    ///
    /// Returns rows for SELECT, `None` for everything else.
    pub fn execute(&self, command: Command) -> Result<Option<Vec<Row>>> {
        tracing::debug!(
            "{} {} ({})",
            command.command_type().keyword(),
            command.table(),
            if command.is_mutation() { "write" } else { "read" }
        );

        match command {
            Command::CreateTable {
                name,
                schema,
                variant,
            } => {
                self.create_table(&name, schema, variant)?;
                Ok(None)
            }
            Command::Insert { table, rows } => {
                self.insert(&table, &rows)?;
                Ok(None)
            }
            Command::Select {
                table,
                columns: None,
            } => Ok(Some(self.select(&table)?)),
            Command::Select {
                table,
                columns: Some(columns),
            } => {
                let names: Vec<&str> = columns.iter().map(String::as_str).collect();
                Ok(Some(self.select_columns(&table, &names)?))
            }
            Command::Truncate { table } => {
                self.truncate(&table)?;
                Ok(None)
            }
            Command::DropTable { table } => {
                self.drop_table(&table)?;
                Ok(None)
            }
        }
    }

    // =========================================================================
    // Table Operations
    // =========================================================================

    /// Create a table; no data objects exist until the first insert
    pub fn create_table(&self, name: &str, schema: Schema, variant: Variant) -> Result<()> {
        let table = self
            .catalog
            .create(self.store.as_ref(), name, schema, variant)?;

        tracing::info!(
            "Created table {} {} ENGINE = {} at {}",
            name,
            table.schema(),
            variant,
            table.meta().prefix
        );
        Ok(())
    }

    /// Append rows to a table
    ///
    /// Steps:
    /// 1. Validate and encode the batch (no store calls on failure)
    /// 2. Acquire the table write lock, refuse dirty tables whose stored
    ///    files still disagree with the committed lengths
    /// 3. Create the file set on first write
    /// 4. Append data files, then the mark entry, then put the sizes record
    ///
    /// Any failed write in step 4 marks the table dirty. A failure on the
    /// first write is returned as is, a later one as `PartialWrite`.
    /// Previously committed rows stay readable either way.
    pub fn insert(&self, name: &str, rows: &[Row]) -> Result<usize> {
        let table = self.catalog.get(name)?;

        if rows.len() > self.config.max_insert_rows {
            return Err(BucketLogError::SchemaMismatch(format!(
                "batch of {} rows exceeds the limit of {}",
                rows.len(),
                self.config.max_insert_rows
            )));
        }
        table.schema().validate_rows(rows)?;

        if rows.is_empty() {
            return Ok(0);
        }

        let payload = Self::encode_batch(&table, rows)?;

        let mut files = table.write()?;
        if files.recheck_dirty(self.store.as_ref())? {
            return Err(BucketLogError::TableDirty(name.to_string()));
        }
        files.ensure_initialized(self.store.as_ref())?;

        let lengths: Vec<(Role, u64)> = payload
            .iter()
            .map(|(role, bytes)| (role.clone(), bytes.len() as u64))
            .collect();

        let mark = files.record_insert(rows.len() as u64, &lengths);
        let total = payload.len() + usize::from(mark.is_some()) + 1;

        let sizes = match files.sizes_record().encode() {
            Ok(sizes) => sizes,
            Err(e) => {
                files.revert_insert(rows.len() as u64, &lengths);
                return Err(e);
            }
        };

        let mut written = 0;
        if let Err(e) = self.write_batch(&files, &payload, mark.as_ref(), sizes, &mut written) {
            // A failed call may still have stored some or all of its bytes
            files.revert_insert(rows.len() as u64, &lengths);
            files.mark_dirty();

            if written == 0 {
                tracing::warn!("Insert into {} failed on its first write, table marked dirty: {}", name, e);
                return Err(e);
            }

            tracing::warn!(
                "Partial write on {}: {} of {} files written, table marked dirty: {}",
                name,
                written,
                total,
                e
            );
            return Err(BucketLogError::PartialWrite {
                table: name.to_string(),
                written,
                total,
                reason: e.to_string(),
            });
        }

        tracing::debug!(
            "Inserted {} rows into {} ({} rows total)",
            rows.len(),
            name,
            files.rows()
        );

        Ok(rows.len())
    }

    /// Read every row in insertion order
    pub fn select(&self, name: &str) -> Result<Vec<Row>> {
        let table = self.catalog.get(name)?;
        let all: Vec<usize> = (0..table.schema().len()).collect();
        self.scan(&table, &all)
    }

    /// Read the named columns of every row in insertion order
    ///
    /// `Log` tables only fetch the files of the requested columns.
    pub fn select_columns(&self, name: &str, columns: &[&str]) -> Result<Vec<Row>> {
        let table = self.catalog.get(name)?;
        let indices = table.schema().project(columns)?;
        self.scan(&table, &indices)
    }

    /// Delete every object of a table, keeping its definition
    ///
    /// Idempotent; safe to retry after a failure.
    pub fn truncate(&self, name: &str) -> Result<()> {
        let table = self.catalog.get(name)?;
        let mut files = table.write()?;

        let deleted = files.clear(self.store.as_ref())?;
        tracing::info!("Truncated table {} ({} objects deleted)", name, deleted);

        Ok(())
    }

    /// Delete every object and the definition of a table
    pub fn drop_table(&self, name: &str) -> Result<()> {
        let table = self.catalog.get(name)?;
        let mut files = table.write()?;

        let deleted = files.clear(self.store.as_ref())?;
        self.catalog.remove(self.store.as_ref(), &table)?;
        tracing::info!("Dropped table {} ({} objects deleted)", name, deleted);

        Ok(())
    }

    /// Delete table prefixes that no live table owns
    ///
    /// Returns the number of objects deleted.
    pub fn purge_orphans(&self) -> Result<usize> {
        let mut deleted = 0;

        for prefix in self.catalog.orphaned_prefixes(self.store.as_ref())? {
            let count = self.store.delete_prefix(&prefix)?;
            tracing::info!("Purged orphaned prefix {} ({} objects)", prefix, count);
            deleted += count;
        }

        Ok(deleted)
    }

    // =========================================================================
    // Accessors (for testing and debugging)
    // =========================================================================

    /// Names of all live tables, sorted
    pub fn tables(&self) -> Vec<String> {
        self.catalog.names()
    }

    pub fn schema(&self, name: &str) -> Result<Schema> {
        Ok(self.catalog.get(name)?.schema().clone())
    }

    pub fn variant(&self, name: &str) -> Result<Variant> {
        Ok(self.catalog.get(name)?.variant())
    }

    /// Committed rows of a table
    pub fn row_count(&self, name: &str) -> Result<u64> {
        let table = self.catalog.get(name)?;
        let rows = table.read()?.rows();
        Ok(rows)
    }

    /// Keys currently stored under a table's prefix
    pub fn list_objects(&self, name: &str) -> Result<BTreeSet<String>> {
        let table = self.catalog.get(name)?;
        let files = table.read()?;
        self.store.list(files.prefix())
    }

    /// Number of objects currently stored under a table's prefix
    pub fn object_count(&self, name: &str) -> Result<usize> {
        Ok(self.list_objects(name)?.len())
    }

    /// Objects a table should have: its variant's total once written, else 0
    pub fn expected_object_count(&self, name: &str) -> Result<usize> {
        let table = self.catalog.get(name)?;
        let files = table.read()?;

        if files.is_initialized() {
            Ok(table.variant().expected_object_count(table.schema()))
        } else {
            Ok(0)
        }
    }

    /// Compare the stored object count with the expected one
    ///
    /// Returns the count, or `Corruption` if they differ.
    pub fn verify_objects(&self, name: &str) -> Result<usize> {
        let expected = self.expected_object_count(name)?;
        let actual = self.object_count(name)?;

        if actual != expected {
            return Err(BucketLogError::Corruption(format!(
                "table {} has {} objects, expected {}",
                name, actual, expected
            )));
        }
        Ok(actual)
    }

    /// Committed mark entries (empty for `TinyLog`)
    pub fn marks(&self, name: &str) -> Result<Vec<MarkEntry>> {
        let table = self.catalog.get(name)?;
        let marks = table.read()?.marks().to_vec();
        Ok(marks)
    }

    /// True if a partial write left the table dirty
    pub fn is_dirty(&self, name: &str) -> Result<bool> {
        let table = self.catalog.get(name)?;
        let dirty = table.read()?.is_dirty();
        Ok(dirty)
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Get the object store
    pub fn store(&self) -> &Arc<dyn ObjectStore> {
        &self.store
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    /// Encode a validated batch into per-role payloads
    fn encode_batch(table: &Table, rows: &[Row]) -> Result<Payload> {
        let schema = table.schema();

        match table.variant() {
            Variant::TinyLog => Ok(vec![(Role::Data, format::encode(rows, schema)?)]),
            Variant::Log => {
                let chunks = format::encode_columns(rows, schema)?;
                let mut payload = Vec::with_capacity(schema.len() + schema.nullable_count());

                for ((column, data), nulls) in schema.columns().iter().zip(chunks.data).zip(chunks.nulls) {
                    payload.push((Role::Column(column.name.clone()), data));
                    if let Some(nulls) = nulls {
                        payload.push((Role::NullMap(column.name.clone()), nulls));
                    }
                }

                Ok(payload)
            }
        }
    }

    /// Write an encoded batch, counting completed file writes in `written`
    fn write_batch(
        &self,
        files: &FileTable,
        payload: &[(Role, Vec<u8>)],
        mark: Option<&MarkEntry>,
        sizes: Vec<u8>,
        written: &mut usize,
    ) -> Result<()> {
        for (role, bytes) in payload {
            self.store.append(&files.key(role), bytes)?;
            *written += 1;
        }

        if let Some(mark) = mark {
            self.store.append(&files.key(&Role::Marks), &mark.encode())?;
            *written += 1;
        }

        self.store.put(&files.key(&Role::Sizes), Bytes::from(sizes))?;
        *written += 1;

        Ok(())
    }

    /// Read the committed rows of a table, projected to `indices`
    fn scan(&self, table: &Table, indices: &[usize]) -> Result<Vec<Row>> {
        let files = table.read()?;
        let schema = table.schema();

        let rows = match table.variant() {
            Variant::TinyLog => {
                let bytes = files.read_committed(self.store.as_ref(), &Role::Data)?;
                let rows = format::decode(&bytes, schema)?;

                let identity = indices.len() == schema.len()
                    && indices.iter().enumerate().all(|(pos, &i)| pos == i);
                if identity {
                    rows
                } else {
                    rows.into_iter()
                        .map(|row| indices.iter().map(|&i| row[i].clone()).collect())
                        .collect()
                }
            }
            Variant::Log => self.scan_columns(schema, &files, indices)?,
        };

        if rows.len() as u64 != files.rows() {
            return Err(BucketLogError::Corruption(format!(
                "table {}: decoded {} rows, committed {}",
                table.name(),
                rows.len(),
                files.rows()
            )));
        }

        tracing::debug!("Selected {} rows from {}", rows.len(), table.name());
        Ok(rows)
    }

    /// Decode the requested columns of a `Log` table block by block
    fn scan_columns(&self, schema: &Schema, files: &FileTable, indices: &[usize]) -> Result<Vec<Row>> {
        let mut roles = Vec::new();
        for &i in indices {
            let column = &schema.columns()[i];
            let role = Role::Column(column.name.clone());
            if roles.contains(&role) {
                continue;
            }
            roles.push(role);
            if column.nullable {
                roles.push(Role::NullMap(column.name.clone()));
            }
        }

        let fetched = self.fetch(files, &roles)?;
        let blobs: HashMap<Role, Bytes> = roles.into_iter().zip(fetched).collect();

        let mut columns = Vec::with_capacity(indices.len());
        for &i in indices {
            let column = &schema.columns()[i];
            let data = blobs
                .get(&Role::Column(column.name.clone()))
                .cloned()
                .unwrap_or_default();
            let nulls = blobs.get(&Role::NullMap(column.name.clone())).cloned();

            let values = decode_marked(files.marks(), i, column, &data, nulls.as_deref())?;
            columns.push(values.into_iter());
        }

        let total = files.rows() as usize;
        let rows = (0..total)
            .map(|_| {
                columns
                    .iter_mut()
                    .map(|values| values.next().unwrap_or(Value::Null))
                    .collect()
            })
            .collect();

        Ok(rows)
    }

    /// Fetch the committed bytes of several roles, in parallel if configured
    fn fetch(&self, files: &FileTable, roles: &[Role]) -> Result<Vec<Bytes>> {
        let store = self.store.as_ref();

        if !self.config.parallel_reads || roles.len() < 2 {
            return roles
                .iter()
                .map(|role| files.read_committed(store, role))
                .collect();
        }

        crossbeam::thread::scope(|s| {
            let handles: Vec<_> = roles
                .iter()
                .map(|role| s.spawn(move |_| files.read_committed(store, role)))
                .collect();

            handles
                .into_iter()
                .map(|handle| {
                    handle
                        .join()
                        .map_err(|_| {
                            BucketLogError::StoreUnavailable("column fetch thread panicked".to_string())
                        })
                        .and_then(|result| result)
                })
                .collect::<Result<Vec<Bytes>>>()
        })
        .map_err(|_| BucketLogError::StoreUnavailable("column fetch scope panicked".to_string()))?
    }
}

/// Decode one column of a `Log` table using the marks as block boundaries
///
/// Each block must decode to exactly `mark.rows` values and end where the
/// next block starts.
fn decode_marked(
    marks: &[MarkEntry],
    pos: usize,
    column: &ColumnDef,
    data: &[u8],
    nulls: Option<&[u8]>,
) -> Result<Vec<Value>> {
    let mut values = Vec::new();

    for (n, mark) in marks.iter().enumerate() {
        let start = mark.offsets[pos] as usize;
        let end = marks
            .get(n + 1)
            .map(|next| next.offsets[pos] as usize)
            .unwrap_or(data.len());

        if start > end || end > data.len() {
            return Err(BucketLogError::Corruption(format!(
                "column {}: mark {} spans bytes {}..{} of {}",
                column.name,
                n,
                start,
                end,
                data.len()
            )));
        }

        let block_nulls = match nulls {
            Some(flags) => {
                let from = mark.row_offset as usize;
                let to = from.checked_add(mark.rows as usize).unwrap_or(usize::MAX);
                Some(flags.get(from..to).ok_or_else(|| {
                    BucketLogError::Corruption(format!(
                        "column {}: null map shorter than {} rows",
                        column.name, to
                    ))
                })?)
            }
            None => None,
        };

        values.extend(format::decode_column(
            &data[start..end],
            column,
            mark.rows as usize,
            block_nulls,
        )?);
    }

    Ok(values)
}
