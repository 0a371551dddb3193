//! Delimited-file encoding of tables.
//!
//! One file per table, header row first. The `_id` column carries record
//! identifiers; every other column is a field. Empty cells mean "absent".
//! Cell text is typed on load (bool, int, float, JSON list, JSON string
//! literal, plain string; zero-padded numeric codes stay strings) and strings
//! that would be re-typed are written as
//! JSON string literals, so a dump/load cycle is lossless except for nulls.

use std::fs;
use std::path::Path;

use csv::{ReaderBuilder, StringRecord, WriterBuilder};
use tracing::debug;

use crate::error::{Result, StoreError};

use super::table::Table;
use super::types::{Fields, Value, ID_FIELD};

/// File extension of table files.
pub const TABLE_EXTENSION: &str = "csv";

struct ColumnSpec {
    name: String,
    index: usize,
}

/// Reads one table file.
///
/// Files without an `_id` column get their zero-based row numbers as
/// identifiers. `limit` caps the number of rows read.
pub(crate) fn read_table(
    path: &Path,
    name: &str,
    delimiter: u8,
    limit: Option<usize>,
) -> Result<Table> {
    let mut reader = ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .from_path(path)?;
    let headers = reader.headers()?.clone();
    let id_index = headers.iter().position(|h| h == ID_FIELD);
    let columns = resolve_columns(&headers, id_index);

    let mut table = Table::new(name);
    for (row, result) in reader.records().enumerate() {
        if limit.is_some_and(|limit| row >= limit) {
            break;
        }
        let record = result?;
        let id = match id_index {
            Some(idx) => record
                .get(idx)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .ok_or_else(|| corrupt(path, format!("row {row} has an empty _id")))?,
            None => row.to_string(),
        };
        if table.contains(&id) {
            return Err(corrupt(path, format!("duplicate _id '{id}'")));
        }
        table.put(build_fields(&record, &columns), Some(&id))?;
    }
    debug!(table = name, records = table.len(), path = %path.display(), "loaded table");
    Ok(table)
}

/// Writes one table file, replacing any previous content.
pub(crate) fn write_table(path: &Path, table: &Table, delimiter: u8) -> Result<()> {
    let names = table.field_names();
    let staging = path.with_extension(format!("{TABLE_EXTENSION}.tmp"));
    {
        let mut writer = WriterBuilder::new()
            .delimiter(delimiter)
            .from_path(&staging)?;
        let mut header = Vec::with_capacity(1 + names.len());
        header.push(ID_FIELD.to_string());
        header.extend(names.iter().cloned());
        writer.write_record(&header)?;

        for (id, fields) in table.iter() {
            let mut row = Vec::with_capacity(header.len());
            row.push(id.to_string());
            for name in &names {
                let cell = match fields.get(name) {
                    Some(value) => format_cell(value).map_err(|message| corrupt(path, message))?,
                    None => None,
                };
                row.push(cell.unwrap_or_default());
            }
            writer.write_record(&row)?;
        }
        writer.flush()?;
    }
    fs::rename(&staging, path)?;
    debug!(table = table.name(), records = table.len(), path = %path.display(), "wrote table");
    Ok(())
}

fn resolve_columns(headers: &StringRecord, id_index: Option<usize>) -> Vec<ColumnSpec> {
    headers
        .iter()
        .enumerate()
        .filter(|(idx, _)| Some(*idx) != id_index)
        .map(|(index, name)| ColumnSpec {
            name: name.to_string(),
            index,
        })
        .collect()
}

fn build_fields(record: &StringRecord, columns: &[ColumnSpec]) -> Fields {
    let mut fields = Fields::new();
    for col in columns {
        if let Some(value) = record.get(col.index).and_then(parse_cell) {
            fields.insert(col.name.clone(), value);
        }
    }
    fields
}

/// Types a cell. `None` means the field is absent.
pub fn parse_cell(raw: &str) -> Option<Value> {
    if raw.is_empty() {
        return None;
    }
    if raw.eq_ignore_ascii_case("true") {
        return Some(Value::Bool(true));
    }
    if raw.eq_ignore_ascii_case("false") {
        return Some(Value::Bool(false));
    }
    if let Some(value) = parse_number(raw) {
        return Some(value);
    }
    if raw.starts_with('[') {
        if let Ok(items) = serde_json::from_str::<Vec<Value>>(raw) {
            return Some(Value::List(items));
        }
    }
    if raw.starts_with('"') {
        if let Ok(text) = serde_json::from_str::<String>(raw) {
            return Some(Value::Str(text));
        }
    }
    Some(Value::Str(raw.to_string()))
}

/// Numeric cell, unless the text is a zero-padded code such as `0201`.
///
/// Codes must keep their text so links to `_id` values, which are never
/// typed, still resolve.
fn parse_number(raw: &str) -> Option<Value> {
    let digits = raw.strip_prefix(|c: char| c == '-' || c == '+').unwrap_or(raw);
    if !digits.starts_with(|c: char| c.is_ascii_digit()) {
        return None;
    }
    let padded = digits.len() > 1
        && digits.starts_with('0')
        && digits[1..].starts_with(|c: char| c.is_ascii_digit());
    if padded {
        return None;
    }
    if let Ok(int_val) = raw.parse::<i64>() {
        return (int_val.to_string() == raw).then_some(Value::Int(int_val));
    }
    raw.parse::<f64>().ok().map(Value::Float)
}

/// Renders a value as cell text. `None` leaves the cell empty.
pub(crate) fn format_cell(value: &Value) -> std::result::Result<Option<String>, String> {
    let text = match value {
        Value::Null => return Ok(None),
        Value::Bool(v) => v.to_string(),
        Value::Int(v) => v.to_string(),
        Value::Float(v) => format!("{v:?}"),
        Value::Str(s) => {
            let plain = matches!(parse_cell(s), Some(Value::Str(ref parsed)) if parsed == s);
            if plain {
                s.clone()
            } else {
                serde_json::to_string(s).map_err(|err| err.to_string())?
            }
        }
        Value::List(items) => serde_json::to_string(items).map_err(|err| err.to_string())?,
    };
    Ok(Some(text))
}

fn corrupt(path: &Path, message: impl Into<String>) -> StoreError {
    StoreError::Corruption {
        path: path.to_path_buf(),
        message: message.into(),
    }
}
