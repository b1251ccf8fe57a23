//! Format Module
//!
//! Byte layouts of every object the engine writes.
//!
//! ## Value Encoding
//! Fixed-width types are raw little-endian values. Strings are a `u32`
//! little-endian byte length followed by UTF-8 bytes.
//!
//! ## TinyLog `data` (rows interleaved)
//! ```text
//! ┌──────────────┬──────────────┬─────┬──────────────┬──────────────┐
//! │ row 0 col 0  │ row 0 col 1  │ ... │ row 1 col 0  │     ...      │
//! └──────────────┴──────────────┴─────┴──────────────┴──────────────┘
//!   (nullable values carry a leading flag byte: 1 = null, no value)
//! ```
//!
//! ## Log `data.<col>` / `data.<col>.null` / `marks`
//! ```text
//! data.<col>:       [value][value][value]...     (nulls stored as zero value)
//! data.<col>.null:  [flag u8][flag u8]...        (one byte per row)
//! marks:            [RowOffset u64][Rows u64][Offset u64 per column]...
//! ```
//!
//! ## `sizes` and table metadata (sealed)
//! ```text
//! ┌──────────┬────────────┬───────────┬──────────────────────────┐
//! │Magic (4) │ Version(2) │ CRC32 (4) │ bincode payload          │
//! └──────────┴────────────┴───────────┴──────────────────────────┘
//! ```

pub mod codec;
pub mod marks;
pub mod sizes;

pub use codec::{decode, decode_column, encode, encode_columns, ColumnChunks};
pub use marks::{decode_marks, MarkEntry};
pub use sizes::SizesRecord;

use crate::error::{BucketLogError, Result};

// =============================================================================
// Sealed Record Constants
// =============================================================================

/// Magic bytes identifying a sealed bucketlog record
pub(crate) const MAGIC: &[u8; 4] = b"BKLG";

/// Current sealed record format version
pub(crate) const VERSION: u16 = 1;

/// Header size: Magic (4) + Version (2) + CRC32 (4) = 10 bytes
pub(crate) const SEAL_HEADER_SIZE: usize = 10;

/// Wrap a payload in the magic/version/checksum header
pub(crate) fn seal(payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(SEAL_HEADER_SIZE + payload.len());
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(&VERSION.to_le_bytes());
    out.extend_from_slice(&crc32fast::hash(payload).to_le_bytes());
    out.extend_from_slice(payload);
    out
}

/// Validate the header of a sealed record and return its payload
pub(crate) fn unseal<'a>(bytes: &'a [u8], what: &str) -> Result<&'a [u8]> {
    if bytes.len() < SEAL_HEADER_SIZE {
        return Err(BucketLogError::Corruption(format!(
            "{}: truncated header ({} bytes)",
            what,
            bytes.len()
        )));
    }

    if &bytes[0..4] != MAGIC {
        return Err(BucketLogError::Corruption(format!(
            "{}: invalid magic {:?}",
            what,
            &bytes[0..4]
        )));
    }

    let version = u16::from_le_bytes([bytes[4], bytes[5]]);
    if version != VERSION {
        return Err(BucketLogError::Corruption(format!(
            "{}: unsupported version {}",
            what, version
        )));
    }

    let stored_crc = u32::from_le_bytes([bytes[6], bytes[7], bytes[8], bytes[9]]);
    let payload = &bytes[SEAL_HEADER_SIZE..];
    let actual_crc = crc32fast::hash(payload);
    if stored_crc != actual_crc {
        return Err(BucketLogError::Corruption(format!(
            "{}: checksum mismatch (stored {:08x}, computed {:08x})",
            what, stored_crc, actual_crc
        )));
    }

    Ok(payload)
}
