//! Table schema and values
//!
//! Column types, column definitions, typed values and row validation.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{BucketLogError, Result};

/// Max length of table and column names
const MAX_IDENTIFIER_LEN: usize = 128;

// =============================================================================
// Data Types
// =============================================================================

/// Column data type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Int8,
    Int16,
    Int32,
    Int64,
    Float32,
    Float64,
    String,
}

impl DataType {
    const ALL: [DataType; 11] = [
        DataType::UInt8,
        DataType::UInt16,
        DataType::UInt32,
        DataType::UInt64,
        DataType::Int8,
        DataType::Int16,
        DataType::Int32,
        DataType::Int64,
        DataType::Float32,
        DataType::Float64,
        DataType::String,
    ];

    /// Type name as written in a schema
    pub fn name(&self) -> &'static str {
        match self {
            DataType::UInt8 => "UInt8",
            DataType::UInt16 => "UInt16",
            DataType::UInt32 => "UInt32",
            DataType::UInt64 => "UInt64",
            DataType::Int8 => "Int8",
            DataType::Int16 => "Int16",
            DataType::Int32 => "Int32",
            DataType::Int64 => "Int64",
            DataType::Float32 => "Float32",
            DataType::Float64 => "Float64",
            DataType::String => "String",
        }
    }

    /// Encoded width in bytes, `None` for variable-width types
    pub fn fixed_width(&self) -> Option<usize> {
        match self {
            DataType::UInt8 | DataType::Int8 => Some(1),
            DataType::UInt16 | DataType::Int16 => Some(2),
            DataType::UInt32 | DataType::Int32 | DataType::Float32 => Some(4),
            DataType::UInt64 | DataType::Int64 | DataType::Float64 => Some(8),
            DataType::String => None,
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DataType {
    type Err = BucketLogError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|t| t.name() == s)
            .ok_or_else(|| BucketLogError::InvalidSchema(format!("unknown type {:?}", s)))
    }
}

// =============================================================================
// Columns and Schema
// =============================================================================

/// A named, typed column
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDef {
    pub name: String,
    pub data_type: DataType,
    pub nullable: bool,
}

impl ColumnDef {
    /// A non-nullable column
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            nullable: false,
        }
    }

    /// A `Nullable(T)` column
    pub fn nullable(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            nullable: true,
        }
    }

    /// Parse `name:Type` or `name:Nullable(Type)`
    pub fn parse(text: &str) -> Result<Self> {
        let (name, ty) = text.split_once(':').ok_or_else(|| {
            BucketLogError::InvalidSchema(format!("column {:?} is not name:Type", text))
        })?;

        let ty = ty.trim();
        let column = match ty
            .strip_prefix("Nullable(")
            .and_then(|inner| inner.strip_suffix(')'))
        {
            Some(inner) => Self::nullable(name.trim(), inner.trim().parse()?),
            None => Self::new(name.trim(), ty.parse()?),
        };

        Ok(column)
    }

    /// Type as written in a schema, e.g. `Nullable(String)`
    pub fn type_name(&self) -> String {
        if self.nullable {
            format!("Nullable({})", self.data_type)
        } else {
            self.data_type.to_string()
        }
    }
}

impl fmt::Display for ColumnDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.name, self.type_name())
    }
}

/// Ordered column list of a table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    columns: Vec<ColumnDef>,
}

impl Schema {
    /// Build a schema, rejecting empty column lists and bad or duplicate names
    pub fn new(columns: Vec<ColumnDef>) -> Result<Self> {
        if columns.is_empty() {
            return Err(BucketLogError::InvalidSchema(
                "a table needs at least one column".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for column in &columns {
            validate_identifier("column", &column.name)?;
            if !seen.insert(column.name.as_str()) {
                return Err(BucketLogError::InvalidSchema(format!(
                    "duplicate column {:?}",
                    column.name
                )));
            }
        }

        Ok(Self { columns })
    }

    pub fn columns(&self) -> &[ColumnDef] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Number of `Nullable` columns
    pub fn nullable_count(&self) -> usize {
        self.columns.iter().filter(|c| c.nullable).count()
    }

    /// Position of a column by name
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// Resolve column names to positions (`SchemaMismatch` on unknown names)
    pub fn project(&self, names: &[&str]) -> Result<Vec<usize>> {
        names
            .iter()
            .map(|name| {
                self.index_of(name).ok_or_else(|| {
                    BucketLogError::SchemaMismatch(format!("unknown column {:?}", name))
                })
            })
            .collect()
    }

    /// Check one row against the column types
    pub fn validate_row(&self, row: &[Value]) -> Result<()> {
        if row.len() != self.columns.len() {
            return Err(BucketLogError::SchemaMismatch(format!(
                "expected {} values per row, got {}",
                self.columns.len(),
                row.len()
            )));
        }

        for (value, column) in row.iter().zip(&self.columns) {
            match value.data_type() {
                None if column.nullable => {}
                None => {
                    return Err(BucketLogError::SchemaMismatch(format!(
                        "column {} is not nullable",
                        column.name
                    )))
                }
                Some(ty) if ty == column.data_type => {}
                Some(ty) => {
                    return Err(BucketLogError::SchemaMismatch(format!(
                        "column {} expects {}, got {}",
                        column.name,
                        column.type_name(),
                        ty
                    )))
                }
            }
        }

        Ok(())
    }

    /// Check every row of a batch
    pub fn validate_rows(&self, rows: &[Row]) -> Result<()> {
        for (i, row) in rows.iter().enumerate() {
            self.validate_row(row).map_err(|e| match e {
                BucketLogError::SchemaMismatch(msg) => {
                    BucketLogError::SchemaMismatch(format!("row {}: {}", i, msg))
                }
                other => other,
            })?;
        }
        Ok(())
    }
}

impl fmt::Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cols: Vec<String> = self.columns.iter().map(|c| c.to_string()).collect();
        write!(f, "({})", cols.join(", "))
    }
}

/// Table and column names: ASCII letters, digits and `_`
pub(crate) fn validate_identifier(kind: &str, name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && name.len() <= MAX_IDENTIFIER_LEN
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');

    if !valid {
        return Err(BucketLogError::InvalidSchema(format!(
            "invalid {} name {:?}",
            kind, name
        )));
    }
    Ok(())
}

// =============================================================================
// Values
// =============================================================================

/// A single typed value
#[derive(Debug, Clone, PartialEq, PartialOrd)]
pub enum Value {
    Null,
    UInt8(u8),
    UInt16(u16),
    UInt32(u32),
    UInt64(u64),
    Int8(i8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    Float32(f32),
    Float64(f64),
    String(String),
}

/// One table row, ordered like the schema
pub type Row = Vec<Value>;

impl Value {
    /// Type of the value, `None` for `Null`
    pub fn data_type(&self) -> Option<DataType> {
        match self {
            Value::Null => None,
            Value::UInt8(_) => Some(DataType::UInt8),
            Value::UInt16(_) => Some(DataType::UInt16),
            Value::UInt32(_) => Some(DataType::UInt32),
            Value::UInt64(_) => Some(DataType::UInt64),
            Value::Int8(_) => Some(DataType::Int8),
            Value::Int16(_) => Some(DataType::Int16),
            Value::Int32(_) => Some(DataType::Int32),
            Value::Int64(_) => Some(DataType::Int64),
            Value::Float32(_) => Some(DataType::Float32),
            Value::Float64(_) => Some(DataType::Float64),
            Value::String(_) => Some(DataType::String),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Zero value of a type (written in place of nulls in column files)
    pub fn default_for(data_type: DataType) -> Self {
        match data_type {
            DataType::UInt8 => Value::UInt8(0),
            DataType::UInt16 => Value::UInt16(0),
            DataType::UInt32 => Value::UInt32(0),
            DataType::UInt64 => Value::UInt64(0),
            DataType::Int8 => Value::Int8(0),
            DataType::Int16 => Value::Int16(0),
            DataType::Int32 => Value::Int32(0),
            DataType::Int64 => Value::Int64(0),
            DataType::Float32 => Value::Float32(0.0),
            DataType::Float64 => Value::Float64(0.0),
            DataType::String => Value::String(String::new()),
        }
    }

    /// Parse a text value for a column; `\N` or `NULL` is null
    pub fn parse(column: &ColumnDef, text: &str) -> Result<Self> {
        if column.nullable && (text == "\\N" || text.eq_ignore_ascii_case("null")) {
            return Ok(Value::Null);
        }

        let mismatch = || {
            BucketLogError::SchemaMismatch(format!(
                "cannot parse {:?} as {} for column {}",
                text,
                column.type_name(),
                column.name
            ))
        };

        let t = text.trim();
        let value = match column.data_type {
            DataType::UInt8 => Value::UInt8(t.parse().map_err(|_| mismatch())?),
            DataType::UInt16 => Value::UInt16(t.parse().map_err(|_| mismatch())?),
            DataType::UInt32 => Value::UInt32(t.parse().map_err(|_| mismatch())?),
            DataType::UInt64 => Value::UInt64(t.parse().map_err(|_| mismatch())?),
            DataType::Int8 => Value::Int8(t.parse().map_err(|_| mismatch())?),
            DataType::Int16 => Value::Int16(t.parse().map_err(|_| mismatch())?),
            DataType::Int32 => Value::Int32(t.parse().map_err(|_| mismatch())?),
            DataType::Int64 => Value::Int64(t.parse().map_err(|_| mismatch())?),
            DataType::Float32 => Value::Float32(t.parse().map_err(|_| mismatch())?),
            DataType::Float64 => Value::Float64(t.parse().map_err(|_| mismatch())?),
            DataType::String => Value::String(text.to_string()),
        };

        Ok(value)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("\\N"),
            Value::UInt8(v) => write!(f, "{}", v),
            Value::UInt16(v) => write!(f, "{}", v),
            Value::UInt32(v) => write!(f, "{}", v),
            Value::UInt64(v) => write!(f, "{}", v),
            Value::Int8(v) => write!(f, "{}", v),
            Value::Int16(v) => write!(f, "{}", v),
            Value::Int32(v) => write!(f, "{}", v),
            Value::Int64(v) => write!(f, "{}", v),
            Value::Float32(v) => write!(f, "{}", v),
            Value::Float64(v) => write!(f, "{}", v),
            Value::String(v) => f.write_str(v),
        }
    }
}

macro_rules! impl_value_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    Value::$variant(v)
                }
            }
        )*
    };
}

impl_value_from! {
    u8 => UInt8,
    u16 => UInt16,
    u32 => UInt32,
    u64 => UInt64,
    i8 => Int8,
    i16 => Int16,
    i32 => Int32,
    i64 => Int64,
    f32 => Float32,
    f64 => Float64,
    String => String,
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}
