//! Mark entries
//!
//! One fixed-width entry is appended to `marks` per insert into a `Log`
//! table. Entries are never rewritten.

use bytes::{Buf, BufMut};

use crate::error::{BucketLogError, Result};

/// Position of one insert block inside the column files
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkEntry {
    /// Rows in the table before this block
    pub row_offset: u64,

    /// Rows in this block
    pub rows: u64,

    /// Byte offset of the block in each `data.<col>` file, schema order
    pub offsets: Vec<u64>,
}

impl MarkEntry {
    /// Encoded size for a table with `columns` columns
    pub fn encoded_len(columns: usize) -> usize {
        16 + 8 * columns
    }

    /// Encode as `[RowOffset u64][Rows u64][Offset u64]...` little-endian
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(Self::encoded_len(self.offsets.len()));
        buf.put_u64_le(self.row_offset);
        buf.put_u64_le(self.rows);
        for offset in &self.offsets {
            buf.put_u64_le(*offset);
        }
        buf
    }
}

/// Decode every entry of a `marks` object
///
/// Entries must be contiguous: each one starts where the previous block
/// ended, in rows and in bytes of every column.
pub fn decode_marks(bytes: &[u8], columns: usize) -> Result<Vec<MarkEntry>> {
    let entry_len = MarkEntry::encoded_len(columns);
    if bytes.len() % entry_len != 0 {
        return Err(BucketLogError::Corruption(format!(
            "marks: {} bytes is not a multiple of entry size {}",
            bytes.len(),
            entry_len
        )));
    }

    let mut buf = bytes;
    let mut marks: Vec<MarkEntry> = Vec::with_capacity(bytes.len() / entry_len);
    let mut next_row = 0u64;

    while buf.has_remaining() {
        let row_offset = buf.get_u64_le();
        let rows = buf.get_u64_le();
        let offsets: Vec<u64> = (0..columns).map(|_| buf.get_u64_le()).collect();

        if row_offset != next_row {
            return Err(BucketLogError::Corruption(format!(
                "marks: entry {} starts at row {}, expected {}",
                marks.len(),
                row_offset,
                next_row
            )));
        }

        next_row = row_offset.checked_add(rows).ok_or_else(|| {
            BucketLogError::Corruption(format!("marks: entry {} row count overflows", marks.len()))
        })?;

        if let Some(prev) = marks.last() {
            if offsets.iter().zip(&prev.offsets).any(|(cur, before)| cur < before) {
                return Err(BucketLogError::Corruption(format!(
                    "marks: entry {} has offsets moving backwards",
                    marks.len()
                )));
            }
        }

        marks.push(MarkEntry {
            row_offset,
            rows,
            offsets,
        });
    }

    Ok(marks)
}
