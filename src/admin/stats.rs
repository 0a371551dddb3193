use serde::Serialize;

use crate::error::Result;
use crate::storage::Store;

/// Summary of every table in a store.
#[derive(Debug, Clone, Serialize)]
pub struct StatsReport {
    /// Backing directory, if any.
    pub directory: Option<String>,
    /// Whether the store was opened read-only.
    pub read_only: bool,
    /// Total records over all tables.
    pub record_count: usize,
    /// Per-table details, sorted by name.
    pub tables: Vec<TableStats>,
}

/// Size and shape of one table.
#[derive(Debug, Clone, Serialize)]
pub struct TableStats {
    /// Table name.
    pub name: String,
    /// Number of records.
    pub records: usize,
    /// Field names in first-seen order.
    pub fields: Vec<String>,
}

/// Loads every table of `store` and summarizes it.
pub fn stats(store: &Store) -> Result<StatsReport> {
    let mut tables = Vec::new();
    for name in store.table_names() {
        let table = store.table(&name)?;
        tables.push(TableStats {
            records: table.len(),
            fields: table.field_names(),
            name,
        });
    }
    Ok(StatsReport {
        directory: store.directory().map(|path| path.display().to_string()),
        read_only: store.is_read_only(),
        record_count: tables.iter().map(|t| t.records).sum(),
        tables,
    })
}
