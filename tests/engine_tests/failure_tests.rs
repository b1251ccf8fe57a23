//! Tests for Engine behavior when the object store fails
//!
//! These tests verify:
//! - A store that fails before any write surfaces `StoreUnavailable`
//! - A failure mid-insert returns `PartialWrite` and marks the table dirty
//! - Previously committed rows stay readable after a failed insert
//! - A write that fails after the store applied it leaves the table dirty
//! - Dirty tables refuse inserts until truncated, unless the store shows
//!   nothing past the committed lengths
//! - Dirty state is detected again when the engine is reopened

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;

use bucketlog::store::{MemoryStore, ObjectStore};
use bucketlog::{BucketLogError, ColumnDef, Config, DataType, Engine, Result, Row, Schema, Value, Variant};

// =============================================================================
// Failing Store
// =============================================================================

/// Memory store that fails on demand
#[derive(Debug, Default)]
struct FailingStore {
    inner: MemoryStore,

    /// Writes (put/append) allowed before every further write fails; `None` = unlimited
    write_budget: Mutex<Option<usize>>,

    /// Next append is stored, then reported as failed
    apply_then_fail: AtomicBool,

    fail_reads: AtomicBool,
    fail_deletes: AtomicBool,
}

impl FailingStore {
    fn allow_writes(&self, budget: Option<usize>) {
        *self.write_budget.lock() = budget;
    }

    fn check_write(&self, key: &str) -> Result<()> {
        let mut budget = self.write_budget.lock();
        match budget.as_mut() {
            Some(0) => Err(BucketLogError::StoreUnavailable(format!(
                "injected failure writing {}",
                key
            ))),
            Some(n) => {
                *n -= 1;
                Ok(())
            }
            None => Ok(()),
        }
    }

    fn check(&self, flag: &AtomicBool, key: &str) -> Result<()> {
        if flag.load(Ordering::SeqCst) {
            return Err(BucketLogError::StoreUnavailable(format!("injected failure on {}", key)));
        }
        Ok(())
    }
}

impl ObjectStore for FailingStore {
    fn put(&self, key: &str, bytes: Bytes) -> Result<()> {
        self.check_write(key)?;
        self.inner.put(key, bytes)
    }

    fn append(&self, key: &str, bytes: &[u8]) -> Result<()> {
        self.check_write(key)?;
        self.inner.append(key, bytes)?;

        if self.apply_then_fail.swap(false, Ordering::SeqCst) {
            return Err(BucketLogError::StoreUnavailable("timeout".to_string()));
        }
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Bytes> {
        self.check(&self.fail_reads, key)?;
        self.inner.get(key)
    }

    fn list(&self, prefix: &str) -> Result<BTreeSet<String>> {
        self.inner.list(prefix)
    }

    fn delete(&self, key: &str) -> Result<()> {
        self.check(&self.fail_deletes, key)?;
        self.inner.delete(key)
    }

    fn size(&self, key: &str) -> Result<Option<u64>> {
        self.inner.size(key)
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

fn setup() -> (Arc<FailingStore>, Engine) {
    let store = Arc::new(FailingStore::default());
    let engine = Engine::with_store(Config::default(), store.clone()).unwrap();
    (store, engine)
}

fn id_schema() -> Schema {
    Schema::new(vec![ColumnDef::new("id", DataType::UInt64)]).unwrap()
}

fn ids(range: std::ops::Range<u64>) -> Vec<Row> {
    range.map(|i| vec![Value::UInt64(i)]).collect()
}

// =============================================================================
// Insert Failure Tests
// =============================================================================

#[test]
fn test_store_unavailable_before_any_write() {
    let (store, engine) = setup();
    engine.create_table("t", id_schema(), Variant::Log).unwrap();

    store.allow_writes(Some(0));
    let err = engine.insert("t", &ids(0..3)).unwrap_err();

    assert!(matches!(err, BucketLogError::StoreUnavailable(_)));
    assert!(!engine.is_dirty("t").unwrap());
    assert_eq!(engine.object_count("t").unwrap(), 0);

    store.allow_writes(None);
    engine.insert("t", &ids(0..3)).unwrap();
    assert_eq!(engine.select("t").unwrap(), ids(0..3));
}

#[test]
fn test_failed_initialization_is_completed_by_next_insert() {
    let (store, engine) = setup();
    engine.create_table("t", id_schema(), Variant::Log).unwrap();

    // Two of the three empty objects get created
    store.allow_writes(Some(2));
    let err = engine.insert("t", &ids(0..1)).unwrap_err();
    assert!(matches!(err, BucketLogError::StoreUnavailable(_)));
    assert_eq!(engine.object_count("t").unwrap(), 2);

    store.allow_writes(None);
    engine.insert("t", &ids(0..1)).unwrap();

    assert_eq!(engine.verify_objects("t").unwrap(), 3);
    assert_eq!(engine.select("t").unwrap(), ids(0..1));
}

#[test]
fn test_partial_write_log() {
    let (store, engine) = setup();
    engine.create_table("t", id_schema(), Variant::Log).unwrap();
    engine.insert("t", &ids(0..5)).unwrap();

    // data.id append succeeds, marks append fails
    store.allow_writes(Some(1));
    let err = engine.insert("t", &ids(5..10)).unwrap_err();

    match err {
        BucketLogError::PartialWrite {
            table,
            written,
            total,
            ..
        } => {
            assert_eq!(table, "t");
            assert_eq!(written, 1);
            assert_eq!(total, 3);
        }
        other => panic!("expected PartialWrite, got {:?}", other),
    }

    assert!(engine.is_dirty("t").unwrap());
    assert_eq!(engine.object_count("t").unwrap(), 3);
    assert_eq!(engine.row_count("t").unwrap(), 5);
    assert_eq!(engine.select("t").unwrap(), ids(0..5));
}

#[test]
fn test_partial_write_tinylog() {
    let (store, engine) = setup();
    engine.create_table("t", id_schema(), Variant::TinyLog).unwrap();
    engine.insert("t", &ids(0..5)).unwrap();

    // data append succeeds, sizes put fails
    store.allow_writes(Some(1));
    let err = engine.insert("t", &ids(5..10)).unwrap_err();

    assert!(matches!(
        err,
        BucketLogError::PartialWrite { written: 1, total: 2, .. }
    ));
    assert_eq!(engine.select("t").unwrap(), ids(0..5));
    assert_eq!(engine.object_count("t").unwrap(), 2);
}

#[test]
fn test_dirty_table_refuses_inserts_until_truncated() {
    let (store, engine) = setup();
    engine.create_table("t", id_schema(), Variant::Log).unwrap();
    engine.insert("t", &ids(0..5)).unwrap();

    store.allow_writes(Some(1));
    let _ = engine.insert("t", &ids(5..10)).unwrap_err();
    store.allow_writes(None);

    let err = engine.insert("t", &ids(5..10)).unwrap_err();
    assert!(matches!(err, BucketLogError::TableDirty(name) if name == "t"));

    engine.truncate("t").unwrap();
    assert!(!engine.is_dirty("t").unwrap());
    assert_eq!(engine.object_count("t").unwrap(), 0);

    engine.insert("t", &ids(7..9)).unwrap();
    assert_eq!(engine.select("t").unwrap(), ids(7..9));
    assert_eq!(engine.verify_objects("t").unwrap(), 3);
}

#[test]
fn test_applied_but_failed_append_marks_dirty() {
    for variant in [Variant::TinyLog, Variant::Log] {
        let (store, engine) = setup();
        engine.create_table("t", id_schema(), variant).unwrap();
        engine.insert("t", &ids(0..5)).unwrap();

        // The first append lands in the store but reports a timeout
        store.apply_then_fail.store(true, Ordering::SeqCst);
        let err = engine.insert("t", &ids(100..102)).unwrap_err();
        assert!(matches!(err, BucketLogError::StoreUnavailable(_)), "{}", variant);
        assert!(engine.is_dirty("t").unwrap());

        let err = engine.insert("t", &ids(5..8)).unwrap_err();
        assert!(matches!(err, BucketLogError::TableDirty(_)), "{}", variant);
        assert_eq!(engine.row_count("t").unwrap(), 5);
        assert_eq!(engine.select("t").unwrap(), ids(0..5));

        engine.truncate("t").unwrap();
        engine.insert("t", &ids(5..8)).unwrap();
        assert_eq!(engine.select("t").unwrap(), ids(5..8));
    }
}

#[test]
fn test_failed_append_that_stored_nothing_is_recovered() {
    for variant in [Variant::TinyLog, Variant::Log] {
        let (store, engine) = setup();
        engine.create_table("t", id_schema(), variant).unwrap();
        engine.insert("t", &ids(0..5)).unwrap();

        store.allow_writes(Some(0));
        let err = engine.insert("t", &ids(100..102)).unwrap_err();
        assert!(matches!(err, BucketLogError::StoreUnavailable(_)), "{}", variant);
        assert!(engine.is_dirty("t").unwrap());

        // Every file is still at its committed length, so the flag clears
        store.allow_writes(None);
        engine.insert("t", &ids(5..8)).unwrap();

        assert!(!engine.is_dirty("t").unwrap());
        assert_eq!(engine.select("t").unwrap(), ids(0..8));
        assert_eq!(engine.verify_objects("t").unwrap(), variant.expected_object_count(&id_schema()));
    }
}

#[test]
fn test_reopen_detects_partial_write() {
    let (store, engine) = setup();
    engine.create_table("t", id_schema(), Variant::TinyLog).unwrap();
    engine.insert("t", &ids(0..4)).unwrap();

    store.allow_writes(Some(1));
    let _ = engine.insert("t", &ids(4..8)).unwrap_err();
    store.allow_writes(None);
    drop(engine);

    let engine = Engine::with_store(Config::default(), store).unwrap();

    assert!(engine.is_dirty("t").unwrap());
    assert_eq!(engine.select("t").unwrap(), ids(0..4));
    assert!(matches!(engine.insert("t", &ids(0..1)), Err(BucketLogError::TableDirty(_))));
}

// =============================================================================
// Read / Delete Failure Tests
// =============================================================================

#[test]
fn test_select_surfaces_store_unavailable() {
    let (store, engine) = setup();
    engine.create_table("t", id_schema(), Variant::Log).unwrap();
    engine.insert("t", &ids(0..3)).unwrap();

    store.fail_reads.store(true, Ordering::SeqCst);
    assert!(matches!(engine.select("t"), Err(BucketLogError::StoreUnavailable(_))));

    store.fail_reads.store(false, Ordering::SeqCst);
    assert_eq!(engine.select("t").unwrap(), ids(0..3));
}

#[test]
fn test_failed_truncate_is_retryable() {
    let (store, engine) = setup();
    engine.create_table("t", id_schema(), Variant::Log).unwrap();
    engine.insert("t", &ids(0..3)).unwrap();

    store.fail_deletes.store(true, Ordering::SeqCst);
    assert!(matches!(engine.truncate("t"), Err(BucketLogError::StoreUnavailable(_))));
    assert!(engine.is_dirty("t").unwrap());

    store.fail_deletes.store(false, Ordering::SeqCst);
    engine.truncate("t").unwrap();

    assert_eq!(engine.object_count("t").unwrap(), 0);
    assert!(!engine.is_dirty("t").unwrap());
}

#[test]
fn test_failed_drop_keeps_table() {
    let (store, engine) = setup();
    engine.create_table("t", id_schema(), Variant::TinyLog).unwrap();
    engine.insert("t", &ids(0..3)).unwrap();

    store.fail_deletes.store(true, Ordering::SeqCst);
    assert!(engine.drop_table("t").is_err());
    assert_eq!(engine.tables(), vec!["t"]);

    store.fail_deletes.store(false, Ordering::SeqCst);
    engine.drop_table("t").unwrap();

    assert!(engine.tables().is_empty());
    assert!(store.inner.is_empty());
}
