//! Command definitions
//!
//! The five table operations as issued by an SQL layer.

use crate::table::{Row, Schema, Variant};

/// Command types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandType {
    CreateTable,
    Insert,
    Select,
    Truncate,
    DropTable,
}

impl CommandType {
    /// Statement keyword, for logs
    pub fn keyword(&self) -> &'static str {
        match self {
            CommandType::CreateTable => "CREATE TABLE",
            CommandType::Insert => "INSERT",
            CommandType::Select => "SELECT",
            CommandType::Truncate => "TRUNCATE TABLE",
            CommandType::DropTable => "DROP TABLE",
        }
    }
}

/// A parsed command
#[derive(Debug, Clone)]
pub enum Command {
    /// `CREATE TABLE name (schema) ENGINE = variant`
    CreateTable {
        name: String,
        schema: Schema,
        variant: Variant,
    },

    /// `INSERT INTO table ...`
    Insert { table: String, rows: Vec<Row> },

    /// `SELECT columns FROM table` (all columns when `None`)
    Select {
        table: String,
        columns: Option<Vec<String>>,
    },

    /// `TRUNCATE TABLE table`
    Truncate { table: String },

    /// `DROP TABLE table`
    DropTable { table: String },
}

impl Command {
    /// Get the command type
    pub fn command_type(&self) -> CommandType {
        match self {
            Command::CreateTable { .. } => CommandType::CreateTable,
            Command::Insert { .. } => CommandType::Insert,
            Command::Select { .. } => CommandType::Select,
            Command::Truncate { .. } => CommandType::Truncate,
            Command::DropTable { .. } => CommandType::DropTable,
        }
    }

    /// Table the command operates on
    pub fn table(&self) -> &str {
        match self {
            Command::CreateTable { name, .. } => name,
            Command::Insert { table, .. }
            | Command::Select { table, .. }
            | Command::Truncate { table }
            | Command::DropTable { table } => table,
        }
    }

    /// True if the command changes stored objects
    pub fn is_mutation(&self) -> bool {
        !matches!(self, Command::Select { .. })
    }
}
