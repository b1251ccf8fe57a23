//! Row and column codec
//!
//! Encodes row batches into the interleaved `TinyLog` layout or into
//! per-column chunks for `Log`, and decodes them back.

use bytes::{Buf, BufMut};

use crate::error::{BucketLogError, Result};
use crate::table::{ColumnDef, DataType, Row, Schema, Value};

/// Null flag byte values
const NOT_NULL: u8 = 0;
const IS_NULL: u8 = 1;

/// Per-column output of [`encode_columns`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnChunks {
    /// Encoded values, one chunk per column in schema order
    pub data: Vec<Vec<u8>>,

    /// Null flags, `Some` for nullable columns only
    pub nulls: Vec<Option<Vec<u8>>>,
}

// =============================================================================
// Interleaved Rows
// =============================================================================

/// Encode rows interleaved, column by column within each row
pub fn encode(rows: &[Row], schema: &Schema) -> Result<Vec<u8>> {
    let mut buf = Vec::with_capacity(estimate_size(rows.len(), schema));

    for row in rows {
        schema.validate_row(row)?;
        for (value, column) in row.iter().zip(schema.columns()) {
            if column.nullable {
                buf.put_u8(if value.is_null() { IS_NULL } else { NOT_NULL });
                if value.is_null() {
                    continue;
                }
            }
            write_value(&mut buf, column, value)?;
        }
    }

    Ok(buf)
}

/// Decode interleaved rows until the input is exhausted
pub fn decode(bytes: &[u8], schema: &Schema) -> Result<Vec<Row>> {
    let mut buf = bytes;
    let mut rows = Vec::new();

    while buf.has_remaining() {
        let mut row = Vec::with_capacity(schema.len());
        for column in schema.columns() {
            if column.nullable && read_flag(&mut buf, column)? {
                row.push(Value::Null);
                continue;
            }
            row.push(read_value(&mut buf, column)?);
        }
        rows.push(row);
    }

    Ok(rows)
}

// =============================================================================
// Columns
// =============================================================================

/// Encode rows into one chunk per column plus null maps for nullable columns
pub fn encode_columns(rows: &[Row], schema: &Schema) -> Result<ColumnChunks> {
    let mut chunks = ColumnChunks {
        data: schema
            .columns()
            .iter()
            .map(|c| Vec::with_capacity(rows.len() * c.data_type.fixed_width().unwrap_or(8)))
            .collect(),
        nulls: schema
            .columns()
            .iter()
            .map(|c| c.nullable.then(|| Vec::with_capacity(rows.len())))
            .collect(),
    };

    for row in rows {
        schema.validate_row(row)?;
        for (i, (value, column)) in row.iter().zip(schema.columns()).enumerate() {
            if let Some(nulls) = chunks.nulls[i].as_mut() {
                nulls.put_u8(if value.is_null() { IS_NULL } else { NOT_NULL });
            }

            if value.is_null() {
                write_value(&mut chunks.data[i], column, &Value::default_for(column.data_type))?;
            } else {
                write_value(&mut chunks.data[i], column, value)?;
            }
        }
    }

    Ok(chunks)
}

/// Decode exactly `rows` values of one column
///
/// `nulls` is the column's null map slice for the same rows. Leftover
/// bytes after the last value are reported as corruption.
pub fn decode_column(
    bytes: &[u8],
    column: &ColumnDef,
    rows: usize,
    nulls: Option<&[u8]>,
) -> Result<Vec<Value>> {
    if let Some(flags) = nulls {
        if flags.len() != rows {
            return Err(BucketLogError::Corruption(format!(
                "column {}: null map has {} flags for {} rows",
                column.name,
                flags.len(),
                rows
            )));
        }
    }

    let mut buf = bytes;
    let mut values = Vec::with_capacity(rows);

    for i in 0..rows {
        let value = read_value(&mut buf, column)?;
        let is_null = match nulls {
            Some(flags) => flag_value(flags[i], column)?,
            None => false,
        };
        values.push(if is_null { Value::Null } else { value });
    }

    if buf.has_remaining() {
        return Err(BucketLogError::Corruption(format!(
            "column {}: {} trailing bytes after {} values",
            column.name,
            buf.remaining(),
            rows
        )));
    }

    Ok(values)
}

// =============================================================================
// Private Helpers
// =============================================================================

fn estimate_size(rows: usize, schema: &Schema) -> usize {
    let row_width: usize = schema
        .columns()
        .iter()
        .map(|c| c.data_type.fixed_width().unwrap_or(8) + c.nullable as usize)
        .sum();
    rows * row_width
}

fn write_value(buf: &mut Vec<u8>, column: &ColumnDef, value: &Value) -> Result<()> {
    match value {
        Value::UInt8(v) => buf.put_u8(*v),
        Value::UInt16(v) => buf.put_u16_le(*v),
        Value::UInt32(v) => buf.put_u32_le(*v),
        Value::UInt64(v) => buf.put_u64_le(*v),
        Value::Int8(v) => buf.put_i8(*v),
        Value::Int16(v) => buf.put_i16_le(*v),
        Value::Int32(v) => buf.put_i32_le(*v),
        Value::Int64(v) => buf.put_i64_le(*v),
        Value::Float32(v) => buf.put_f32_le(*v),
        Value::Float64(v) => buf.put_f64_le(*v),
        Value::String(s) => {
            let len = u32::try_from(s.len()).map_err(|_| {
                BucketLogError::SchemaMismatch(format!(
                    "column {}: string of {} bytes is too long",
                    column.name,
                    s.len()
                ))
            })?;
            buf.put_u32_le(len);
            buf.put_slice(s.as_bytes());
        }
        Value::Null => {
            return Err(BucketLogError::SchemaMismatch(format!(
                "column {} is not nullable",
                column.name
            )))
        }
    }
    Ok(())
}

fn read_value(buf: &mut &[u8], column: &ColumnDef) -> Result<Value> {
    let width = column.data_type.fixed_width().unwrap_or(4);
    ensure_remaining(buf, width, column)?;

    let value = match column.data_type {
        DataType::UInt8 => Value::UInt8(buf.get_u8()),
        DataType::UInt16 => Value::UInt16(buf.get_u16_le()),
        DataType::UInt32 => Value::UInt32(buf.get_u32_le()),
        DataType::UInt64 => Value::UInt64(buf.get_u64_le()),
        DataType::Int8 => Value::Int8(buf.get_i8()),
        DataType::Int16 => Value::Int16(buf.get_i16_le()),
        DataType::Int32 => Value::Int32(buf.get_i32_le()),
        DataType::Int64 => Value::Int64(buf.get_i64_le()),
        DataType::Float32 => Value::Float32(buf.get_f32_le()),
        DataType::Float64 => Value::Float64(buf.get_f64_le()),
        DataType::String => {
            let len = buf.get_u32_le() as usize;
            ensure_remaining(buf, len, column)?;
            let text = std::str::from_utf8(&(*buf)[..len]).map_err(|e| {
                BucketLogError::Corruption(format!("column {}: invalid UTF-8: {}", column.name, e))
            })?;
            let value = Value::String(text.to_string());
            buf.advance(len);
            value
        }
    };

    Ok(value)
}

fn read_flag(buf: &mut &[u8], column: &ColumnDef) -> Result<bool> {
    ensure_remaining(buf, 1, column)?;
    flag_value(buf.get_u8(), column)
}

fn flag_value(flag: u8, column: &ColumnDef) -> Result<bool> {
    match flag {
        NOT_NULL => Ok(false),
        IS_NULL => Ok(true),
        other => Err(BucketLogError::Corruption(format!(
            "column {}: invalid null flag 0x{:02x}",
            column.name, other
        ))),
    }
}

fn ensure_remaining(buf: &[u8], needed: usize, column: &ColumnDef) -> Result<()> {
    if buf.len() < needed {
        return Err(BucketLogError::Corruption(format!(
            "column {}: truncated value (need {} bytes, have {})",
            column.name,
            needed,
            buf.len()
        )));
    }
    Ok(())
}
