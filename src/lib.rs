//! # bucketlog
//!
//! Log-family table storage engine whose table files are objects in an
//! object store (S3-style bucket, local directory or memory):
//! - `TinyLog`: every column interleaved in one `data` object
//! - `Log`: one object per column plus a `marks` index for block reads
//! - Append-only inserts, full-table reads in insertion order
//! - A fixed object count per table, independent of how many inserts ran
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 Command (CREATE/INSERT/SELECT/...)           │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                        Engine                                │
//! │          (Single Writer / Multi Reader per table)            │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//!          ┌────────────┴────────────┐
//!          │                         │
//!          ▼                         ▼
//!   ┌─────────────┐          ┌─────────────┐
//!   │   Catalog   │          │ File Table  │
//!   │ (metadata/) │          │  (RwLock)   │
//!   └──────┬──────┘          └──────┬──────┘
//!          │                        │  format: codec/marks/sizes
//!          └───────────┬────────────┘
//!                      ▼
//!              ┌───────────────┐
//!              │  ObjectStore  │
//!              │ (Local/Memory)│
//!              └───────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod store;
pub mod format;
pub mod table;
pub mod catalog;
pub mod command;
pub mod engine;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{BucketLogError, Result};
pub use config::Config;
pub use command::{Command, CommandType};
pub use engine::Engine;
pub use store::{LocalStore, MemoryStore, ObjectStore};
pub use table::{ColumnDef, DataType, Role, Row, Schema, Value, Variant};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of bucketlog
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
