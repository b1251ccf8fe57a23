//! Sizes record
//!
//! Committed row count and byte length of every file of a table. The
//! record is overwritten after each successful insert; readers ignore any
//! bytes past the committed lengths.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::Result;

use super::{seal, unseal};

/// Committed state of a table's files
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SizesRecord {
    /// Rows committed across all inserts
    pub rows: u64,

    /// File name → committed byte length
    pub files: BTreeMap<String, u64>,
}

impl SizesRecord {
    /// Serialize with bincode inside a sealed header
    pub fn encode(&self) -> Result<Vec<u8>> {
        let payload = bincode::serialize(self)?;
        Ok(seal(&payload))
    }

    /// Decode a sealed record; an empty object is an empty record
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.is_empty() {
            return Ok(Self::default());
        }

        let payload = unseal(bytes, "sizes")?;
        Ok(bincode::deserialize(payload)?)
    }

    /// Committed length of a file, zero if unknown
    pub fn file_len(&self, name: &str) -> u64 {
        self.files.get(name).copied().unwrap_or(0)
    }
}
