//! Schema-less record storage.
//!
//! Records live in named tables; tables live in a directory-backed store with
//! one delimited file per table.

/// Delimited-file encoding of tables.
pub mod codec;

mod options;
mod store;
mod table;
mod types;

/// Options for opening a store.
pub use options::StoreOptions;

/// Directory-backed collection of lazily loaded tables.
pub use store::Store;

/// Tables and their query surface.
pub use table::{Projected, Projection, Query, Table};

/// Dynamic values and records.
pub use types::{fields, Fields, Record, Value, ID_FIELD};
