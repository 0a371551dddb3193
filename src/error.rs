use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result alias used across the store, hierarchy and partitioning layers.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors raised by tables, stores, the hierarchy index and the partitioner.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A record or table name that does not exist was requested.
    #[error("{what} '{id}' not found")]
    NotFound {
        /// Kind of the missing object ("record", "table", "unit").
        what: &'static str,
        /// Identifier that failed to resolve.
        id: String,
    },
    /// A record was given an empty identifier, which cannot be written to disk.
    #[error("empty record id in table '{table}'")]
    EmptyId {
        /// Table the record was meant for.
        table: String,
    },
    /// A write was attempted on a read-only table or store.
    #[error("read-only violation: {0}")]
    ReadOnlyViolation(String),
    /// A read-only store was opened over a directory that does not exist.
    #[error("store directory not found: {0}")]
    MissingDirectory(PathBuf),
    /// The administrative hierarchy is inconsistent; nothing downstream can be trusted.
    #[error("malformed hierarchy: {0}")]
    MalformedHierarchy(String),
    /// A projection argument had an unsupported shape.
    #[error("invalid projection: {0}")]
    ProjectionType(String),
    /// A table file exists but its content cannot be turned into records.
    #[error("corrupt table file {path}: {message}")]
    Corruption {
        /// Offending file.
        path: PathBuf,
        /// What was wrong with it.
        message: String,
    },
    /// A derived index was requested over a store that can still change.
    #[error("store must be read-only: {0}")]
    NotFrozen(String),
    /// Operation needs a backing directory but the store lives only in memory.
    #[error("store has no backing directory")]
    Detached,
    /// Schema or options could not be loaded.
    #[error("configuration error: {0}")]
    Config(String),
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    /// CSV reader or writer error.
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
}

impl StoreError {
    pub(crate) fn record_not_found(id: impl Into<String>) -> Self {
        StoreError::NotFound {
            what: "record",
            id: id.into(),
        }
    }

    pub(crate) fn table_not_found(name: impl Into<String>) -> Self {
        StoreError::NotFound {
            what: "table",
            id: name.into(),
        }
    }

    pub(crate) fn unit_not_found(id: impl Into<String>) -> Self {
        StoreError::NotFound {
            what: "unit",
            id: id.into(),
        }
    }

    pub(crate) fn malformed(message: impl Into<String>) -> Self {
        StoreError::MalformedHierarchy(message.into())
    }
}
