//! Engine variants and file roles
//!
//! The variant decides a table's file layout. Its role set and object count
//! are pure functions of the variant and the schema.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{BucketLogError, Result};

use super::Schema;

/// File layout of a table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Variant {
    /// All columns interleaved row by row in one `data` file
    TinyLog,

    /// One `data.<col>` file per column, plus a `marks` index
    Log,
}

impl Variant {
    /// Variant name as written in `ENGINE = <name>`
    pub fn name(&self) -> &'static str {
        match self {
            Variant::TinyLog => "TinyLog",
            Variant::Log => "Log",
        }
    }

    /// Fixed non-data files: `sizes`, plus `marks` for `Log`
    pub fn files_overhead(&self) -> usize {
        match self {
            Variant::TinyLog => 1,
            Variant::Log => 2,
        }
    }

    /// Data files: one for `TinyLog`, one per column and null map for `Log`
    pub fn data_files(&self, schema: &Schema) -> usize {
        match self {
            Variant::TinyLog => 1,
            Variant::Log => schema.len() + schema.nullable_count(),
        }
    }

    /// Objects under the table prefix once any row has been written
    pub fn expected_object_count(&self, schema: &Schema) -> usize {
        self.files_overhead() + self.data_files(schema)
    }

    /// Every file role of a table, data roles first
    pub fn roles(&self, schema: &Schema) -> Vec<Role> {
        let mut roles = Vec::with_capacity(self.expected_object_count(schema));

        match self {
            Variant::TinyLog => roles.push(Role::Data),
            Variant::Log => {
                for column in schema.columns() {
                    roles.push(Role::Column(column.name.clone()));
                    if column.nullable {
                        roles.push(Role::NullMap(column.name.clone()));
                    }
                }
                roles.push(Role::Marks);
            }
        }

        roles.push(Role::Sizes);
        roles
    }

    /// True if inserts append a mark entry
    pub fn has_marks(&self) -> bool {
        matches!(self, Variant::Log)
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Variant {
    type Err = BucketLogError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "tinylog" => Ok(Variant::TinyLog),
            "log" => Ok(Variant::Log),
            _ => Err(BucketLogError::InvalidSchema(format!(
                "unknown engine variant {:?} (expected TinyLog or Log)",
                s
            ))),
        }
    }
}

/// Logical file of a table
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Role {
    /// Interleaved rows (`TinyLog`)
    Data,

    /// Values of one column (`Log`)
    Column(String),

    /// Null flags of one nullable column, one byte per row (`Log`)
    NullMap(String),

    /// Mark entries (`Log`)
    Marks,

    /// Committed sizes record
    Sizes,
}

impl Role {
    /// Object name under the table prefix
    pub fn file_name(&self) -> String {
        match self {
            Role::Data => "data".to_string(),
            Role::Column(name) => format!("data.{}", name),
            Role::NullMap(name) => format!("data.{}.null", name),
            Role::Marks => "marks".to_string(),
            Role::Sizes => "sizes".to_string(),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.file_name())
    }
}
