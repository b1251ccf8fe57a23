//! Table Module
//!
//! Schema, variant and file manifest of a table.
//!
//! ## Object Layout
//! ```text
//! {data_root}/{name}.{suffix}/
//!   TinyLog:  data, sizes
//!   Log:      data.{col}..., data.{col}.null (nullable cols), marks, sizes
//! ```
//! The suffix is unique per CREATE, so a dropped table's objects are never
//! picked up by a new table of the same name.

mod file_table;
mod schema;
mod variant;

pub use file_table::FileTable;
pub use schema::{ColumnDef, DataType, Row, Schema, Value};
pub use variant::{Role, Variant};

pub(crate) use schema::validate_identifier;
