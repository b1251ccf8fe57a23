//! Tests for Catalog
//!
//! These tests verify:
//! - Table registration and metadata objects
//! - Unique prefixes per CREATE
//! - Recovery of tables from the metadata root
//! - Orphaned prefix detection

use std::sync::Arc;

use bytes::Bytes;
use bucketlog::catalog::Catalog;
use bucketlog::store::{MemoryStore, ObjectStore};
use bucketlog::{BucketLogError, ColumnDef, Config, DataType, Schema, Variant};

fn schema() -> Schema {
    Schema::new(vec![ColumnDef::new("id", DataType::UInt64)]).unwrap()
}

#[test]
fn test_catalog_create_and_get() {
    let store = MemoryStore::new();
    let catalog = Catalog::open(&store, &Config::default()).unwrap();
    assert!(catalog.is_empty());

    let table = catalog.create(&store, "t", schema(), Variant::Log).unwrap();

    assert_eq!(catalog.len(), 1);
    assert_eq!(table.name(), "t");
    assert_eq!(table.variant(), Variant::Log);
    assert!(table.meta().prefix.starts_with("data/t."));
    assert!(table.meta().prefix.ends_with('/'));
    assert!(Arc::ptr_eq(&catalog.get("t").unwrap(), &table));
    assert!(store.get("metadata/t.meta").is_ok());
}

#[test]
fn test_catalog_prefixes_are_unique() {
    let store = MemoryStore::new();
    let catalog = Catalog::open(&store, &Config::default()).unwrap();

    let a = catalog.create(&store, "a", schema(), Variant::Log).unwrap();
    let b = catalog.create(&store, "b", schema(), Variant::Log).unwrap();

    assert_ne!(a.meta().prefix, b.meta().prefix);
}

#[test]
fn test_catalog_duplicate_and_missing() {
    let store = MemoryStore::new();
    let catalog = Catalog::open(&store, &Config::default()).unwrap();
    catalog.create(&store, "t", schema(), Variant::TinyLog).unwrap();

    assert!(matches!(
        catalog.create(&store, "t", schema(), Variant::TinyLog),
        Err(BucketLogError::TableExists(_))
    ));
    assert!(matches!(catalog.get("u"), Err(BucketLogError::TableNotFound(_))));
}

#[test]
fn test_catalog_recovers_tables() {
    let store = MemoryStore::new();
    let prefix = {
        let catalog = Catalog::open(&store, &Config::default()).unwrap();
        catalog.create(&store, "b", schema(), Variant::Log).unwrap();
        let table = catalog.create(&store, "a", schema(), Variant::TinyLog).unwrap();
        table.meta().prefix.clone()
    };

    let catalog = Catalog::open(&store, &Config::default()).unwrap();

    assert_eq!(catalog.names(), vec!["a", "b"]);
    let table = catalog.get("a").unwrap();
    assert_eq!(table.meta().prefix, prefix);
    assert_eq!(table.schema(), &schema());
    assert!(!table.read().unwrap().is_initialized());
}

#[test]
fn test_catalog_rejects_misnamed_metadata() {
    let store = MemoryStore::new();
    {
        let catalog = Catalog::open(&store, &Config::default()).unwrap();
        catalog.create(&store, "t", schema(), Variant::Log).unwrap();
    }
    let bytes = store.get("metadata/t.meta").unwrap();
    store.put("metadata/other.meta", bytes).unwrap();

    let err = Catalog::open(&store, &Config::default()).unwrap_err();

    assert!(matches!(err, BucketLogError::Corruption(_)));
}

#[test]
fn test_catalog_custom_roots() {
    let store = MemoryStore::new();
    let config = Config::builder().data_root("tables").metadata_root("catalog").build();
    let catalog = Catalog::open(&store, &config).unwrap();

    let table = catalog.create(&store, "t", schema(), Variant::Log).unwrap();

    assert!(table.meta().prefix.starts_with("tables/t."));
    assert_eq!(store.list("catalog/").unwrap().len(), 1);
}

#[test]
fn test_catalog_orphaned_prefixes() {
    let store = MemoryStore::new();
    let catalog = Catalog::open(&store, &Config::default()).unwrap();
    let table = catalog.create(&store, "t", schema(), Variant::Log).unwrap();

    store
        .put(&format!("{}data.id", table.meta().prefix), Bytes::new())
        .unwrap();
    store.put("data/old.1/data", Bytes::new()).unwrap();

    let orphans: Vec<String> = catalog.orphaned_prefixes(&store).unwrap().into_iter().collect();

    assert_eq!(orphans, vec!["data/old.1/"]);
}
