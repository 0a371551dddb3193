//! Hierarchical document store for Polish election data.
//!
//! Records are schema-less field maps kept in named tables, one delimited
//! file per table. On top of the store sit a [`hierarchy::HierarchyIndex`]
//! relating voivodships, constituencies, districts, communes and their
//! polling districts, and a [`partition::Partitioner`] that cuts a store into
//! one self-contained sub-store per administrative unit.

#![warn(missing_docs)]

pub mod admin;
pub mod error;
pub mod hierarchy;
pub mod partition;
pub mod storage;

pub use error::{Result, StoreError};
pub use hierarchy::{EntityKind, Granularity, HierarchyIndex, Schema, UnitClosure};
pub use partition::{Partition, Partitioner, Partitions};
pub use storage::{Query, Record, Store, StoreOptions, Table, Value};
