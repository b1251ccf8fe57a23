//! Tests for the row and column codec
//!
//! These tests verify:
//! - Interleaved encoding of every column type
//! - Per-column chunks with null maps
//! - Byte layout of fixed-width and string values
//! - Detection of truncated and malformed input

use bucketlog::format::{decode, decode_column, encode, encode_columns};
use bucketlog::{BucketLogError, ColumnDef, DataType, Row, Schema, Value};

// =============================================================================
// Helper Functions
// =============================================================================

fn all_types_schema() -> Schema {
    Schema::new(vec![
        ColumnDef::new("u8", DataType::UInt8),
        ColumnDef::new("u16", DataType::UInt16),
        ColumnDef::new("u32", DataType::UInt32),
        ColumnDef::new("u64", DataType::UInt64),
        ColumnDef::new("i8", DataType::Int8),
        ColumnDef::new("i16", DataType::Int16),
        ColumnDef::new("i32", DataType::Int32),
        ColumnDef::new("i64", DataType::Int64),
        ColumnDef::new("f32", DataType::Float32),
        ColumnDef::new("f64", DataType::Float64),
        ColumnDef::new("s", DataType::String),
        ColumnDef::nullable("n", DataType::Int32),
    ])
    .unwrap()
}

fn all_types_row(seed: i64, null: bool) -> Row {
    vec![
        Value::UInt8(seed as u8),
        Value::UInt16(u16::MAX - seed as u16),
        Value::UInt32(seed as u32 * 1000),
        Value::UInt64(u64::MAX - seed as u64),
        Value::Int8(-(seed as i8)),
        Value::Int16(i16::MIN + seed as i16),
        Value::Int32(-(seed as i32) * 7),
        Value::Int64(i64::MIN + seed),
        Value::Float32(seed as f32 / 4.0),
        Value::Float64(-(seed as f64) * 1.5),
        Value::String(format!("row-{}-é", seed)),
        if null { Value::Null } else { Value::Int32(seed as i32) },
    ]
}

// =============================================================================
// Interleaved Encoding Tests
// =============================================================================

#[test]
fn test_interleaved_all_types() {
    let schema = all_types_schema();
    let rows: Vec<Row> = (0..10).map(|i| all_types_row(i, i % 2 == 0)).collect();

    let bytes = encode(&rows, &schema).unwrap();

    assert_eq!(decode(&bytes, &schema).unwrap(), rows);
}

#[test]
fn test_interleaved_layout() {
    let schema = Schema::new(vec![
        ColumnDef::new("id", DataType::UInt16),
        ColumnDef::nullable("name", DataType::String),
    ])
    .unwrap();
    let rows = vec![
        vec![Value::UInt16(1), Value::from("ab")],
        vec![Value::UInt16(2), Value::Null],
    ];

    let bytes = encode(&rows, &schema).unwrap();

    assert_eq!(
        bytes,
        vec![
            1, 0, // id
            0, 2, 0, 0, 0, b'a', b'b', // flag, len, "ab"
            2, 0, // id
            1, // null flag, no value
        ]
    );
}

#[test]
fn test_interleaved_empty() {
    let schema = all_types_schema();

    let bytes = encode(&[], &schema).unwrap();

    assert!(bytes.is_empty());
    assert!(decode(&bytes, &schema).unwrap().is_empty());
}

#[test]
fn test_interleaved_concatenation_decodes_in_order() {
    let schema = Schema::new(vec![ColumnDef::new("s", DataType::String)]).unwrap();
    let first = vec![vec![Value::from("a")], vec![Value::from("bb")]];
    let second = vec![vec![Value::from("")]];

    let mut bytes = encode(&first, &schema).unwrap();
    bytes.extend(encode(&second, &schema).unwrap());

    let decoded = decode(&bytes, &schema).unwrap();
    assert_eq!(decoded, first.into_iter().chain(second).collect::<Vec<_>>());
}

#[test]
fn test_interleaved_rejects_bad_rows() {
    let schema = Schema::new(vec![ColumnDef::new("id", DataType::UInt64)]).unwrap();

    let err = encode(&[vec![Value::Int64(1)]], &schema).unwrap_err();
    assert!(matches!(err, BucketLogError::SchemaMismatch(_)));

    let err = encode(&[vec![]], &schema).unwrap_err();
    assert!(matches!(err, BucketLogError::SchemaMismatch(_)));
}

#[test]
fn test_interleaved_truncated_input() {
    let schema = Schema::new(vec![ColumnDef::new("id", DataType::UInt64)]).unwrap();
    let bytes = encode(&[vec![Value::UInt64(42)]], &schema).unwrap();

    let err = decode(&bytes[..5], &schema).unwrap_err();

    assert!(matches!(err, BucketLogError::Corruption(_)));
}

#[test]
fn test_interleaved_invalid_null_flag() {
    let schema = Schema::new(vec![ColumnDef::nullable("n", DataType::UInt8)]).unwrap();

    let err = decode(&[7, 1], &schema).unwrap_err();

    assert!(matches!(err, BucketLogError::Corruption(msg) if msg.contains("null flag")));
}

#[test]
fn test_interleaved_invalid_utf8() {
    let schema = Schema::new(vec![ColumnDef::new("s", DataType::String)]).unwrap();

    let err = decode(&[2, 0, 0, 0, 0xff, 0xfe], &schema).unwrap_err();

    assert!(matches!(err, BucketLogError::Corruption(_)));
}

// =============================================================================
// Column Encoding Tests
// =============================================================================

#[test]
fn test_columns_all_types() {
    let schema = all_types_schema();
    let rows: Vec<Row> = (0..7).map(|i| all_types_row(i, i % 3 == 0)).collect();

    let chunks = encode_columns(&rows, &schema).unwrap();
    assert_eq!(chunks.data.len(), schema.len());
    assert_eq!(chunks.nulls.iter().filter(|n| n.is_some()).count(), 1);

    for (i, column) in schema.columns().iter().enumerate() {
        let values =
            decode_column(&chunks.data[i], column, rows.len(), chunks.nulls[i].as_deref()).unwrap();
        let expected: Vec<Value> = rows.iter().map(|r| r[i].clone()).collect();
        assert_eq!(values, expected, "column {}", column.name);
    }
}

#[test]
fn test_columns_nulls_written_as_default() {
    let schema = Schema::new(vec![ColumnDef::nullable("n", DataType::UInt32)]).unwrap();
    let rows = vec![vec![Value::UInt32(9)], vec![Value::Null]];

    let chunks = encode_columns(&rows, &schema).unwrap();

    assert_eq!(chunks.data[0], vec![9, 0, 0, 0, 0, 0, 0, 0]);
    assert_eq!(chunks.nulls[0], Some(vec![0, 1]));
}

#[test]
fn test_decode_column_row_count_mismatch() {
    let column = ColumnDef::new("id", DataType::UInt32);
    let bytes = [1, 0, 0, 0, 2, 0, 0, 0];

    // Fewer rows than bytes: trailing data
    let err = decode_column(&bytes, &column, 1, None).unwrap_err();
    assert!(matches!(err, BucketLogError::Corruption(msg) if msg.contains("trailing")));

    // More rows than bytes: truncated
    let err = decode_column(&bytes, &column, 3, None).unwrap_err();
    assert!(matches!(err, BucketLogError::Corruption(_)));
}

#[test]
fn test_decode_column_null_map_length() {
    let column = ColumnDef::nullable("id", DataType::UInt8);

    let err = decode_column(&[1, 2], &column, 2, Some(&[0])).unwrap_err();

    assert!(matches!(err, BucketLogError::Corruption(msg) if msg.contains("null map")));
}
