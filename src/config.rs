//! Configuration for bucketlog
//!
//! Centralized configuration with sensible defaults.

use std::path::PathBuf;

use crate::error::{BucketLogError, Result};

/// Main configuration for a bucketlog engine
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Bucket Configuration
    // -------------------------------------------------------------------------
    /// Root directory of the local bucket (used by `Engine::open`)
    /// Internal structure:
    ///   {bucket_dir}/
    ///     ├── data/            (one prefix per table)
    ///     └── metadata/        (one object per table)
    pub bucket_dir: PathBuf,

    /// Key prefix under which table files are stored
    pub data_root: String,

    /// Key prefix under which table metadata objects are stored
    pub metadata_root: String,

    // -------------------------------------------------------------------------
    // Read/Write Configuration
    // -------------------------------------------------------------------------
    /// Fetch column files of per-column tables on parallel threads
    pub parallel_reads: bool,

    /// Max rows accepted by a single insert
    pub max_insert_rows: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bucket_dir: PathBuf::from("./bucketlog_data"),
            data_root: "data".to_string(),
            metadata_root: "metadata".to_string(),
            parallel_reads: true,
            max_insert_rows: 1024 * 1024,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Check the key roots and limits before an engine uses them
    pub fn validate(&self) -> Result<()> {
        for (label, root) in [("data_root", &self.data_root), ("metadata_root", &self.metadata_root)] {
            if root.is_empty() {
                return Err(BucketLogError::Config(format!("{} must not be empty", label)));
            }
            if root.contains('/') || root.contains("..") {
                return Err(BucketLogError::Config(format!(
                    "{} must be a single key segment, got {:?}",
                    label, root
                )));
            }
        }

        if self.data_root == self.metadata_root {
            return Err(BucketLogError::Config(
                "data_root and metadata_root must differ".to_string(),
            ));
        }

        if self.max_insert_rows == 0 {
            return Err(BucketLogError::Config(
                "max_insert_rows must be at least 1".to_string(),
            ));
        }

        Ok(())
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the local bucket directory
    pub fn bucket_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.bucket_dir = path.into();
        self
    }

    /// Set the key prefix for table files
    pub fn data_root(mut self, root: impl Into<String>) -> Self {
        self.config.data_root = root.into();
        self
    }

    /// Set the key prefix for table metadata
    pub fn metadata_root(mut self, root: impl Into<String>) -> Self {
        self.config.metadata_root = root.into();
        self
    }

    /// Enable or disable parallel column fetches
    pub fn parallel_reads(mut self, enabled: bool) -> Self {
        self.config.parallel_reads = enabled;
        self
    }

    /// Set the maximum rows per insert
    pub fn max_insert_rows(mut self, rows: usize) -> Self {
        self.config.max_insert_rows = rows;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
