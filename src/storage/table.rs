use std::collections::HashMap;

use rand::Rng;

use crate::error::{Result, StoreError};

use super::types::{Fields, Record, Value, ID_FIELD};

const HEX_DIGITS: &[u8; 16] = b"0123456789abcdef";
const UUID_PARTS: [usize; 5] = [8, 4, 4, 4, 12];

/// Exact-match query: every listed field must be present and equal.
///
/// The empty query matches every record. [`ID_FIELD`] matches against the
/// record identifier.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Query {
    terms: Fields,
}

impl Query {
    /// Query matching every record.
    pub fn all() -> Self {
        Self::default()
    }

    /// Adds an equality term.
    pub fn eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.terms.insert(field.into(), value.into());
        self
    }

    /// Returns true when the query has no terms.
    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    fn matches(&self, id: &str, fields: &Fields) -> bool {
        self.terms.iter().all(|(key, expected)| {
            if key == ID_FIELD {
                return expected.as_str() == Some(id);
            }
            fields.get(key) == Some(expected)
        })
    }
}

impl From<Fields> for Query {
    fn from(terms: Fields) -> Self {
        Self { terms }
    }
}

/// Which part of each matching record a projected lookup returns.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Projection {
    /// One value per record.
    Field(String),
    /// One value tuple per record, in the listed order.
    Fields(Vec<String>),
}

impl From<&str> for Projection {
    fn from(field: &str) -> Self {
        Projection::Field(field.to_string())
    }
}

impl From<Vec<&str>> for Projection {
    fn from(fields: Vec<&str>) -> Self {
        Projection::Fields(fields.into_iter().map(str::to_string).collect())
    }
}

impl TryFrom<Value> for Projection {
    type Error = StoreError;

    fn try_from(value: Value) -> Result<Self> {
        match value {
            Value::Str(field) => Ok(Projection::Field(field)),
            Value::List(items) if !items.is_empty() => items
                .into_iter()
                .map(|item| match item {
                    Value::Str(field) => Ok(field),
                    other => Err(StoreError::ProjectionType(format!(
                        "field names must be strings, got {other}"
                    ))),
                })
                .collect::<Result<Vec<_>>>()
                .map(Projection::Fields),
            Value::List(_) => Err(StoreError::ProjectionType(
                "field list must not be empty".into(),
            )),
            other => Err(StoreError::ProjectionType(format!(
                "expected a field name or a list of field names, got {other}"
            ))),
        }
    }
}

/// Result of projecting a single record.
#[derive(Clone, Debug, PartialEq)]
pub enum Projected {
    /// Output of [`Projection::Field`].
    Value(Value),
    /// Output of [`Projection::Fields`]; missing fields are [`Value::Null`].
    Row(Vec<Value>),
}

/// Named collection of records, kept in insertion order.
#[derive(Clone, Debug)]
pub struct Table {
    name: String,
    read_only: bool,
    order: Vec<String>,
    rows: HashMap<String, Fields>,
}

impl Table {
    /// Creates an empty, writable table.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            read_only: false,
            order: Vec::new(),
            rows: HashMap::new(),
        }
    }

    /// Table name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether writes are refused.
    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// Makes the table read-only. There is no way back.
    pub fn freeze(&mut self) {
        self.read_only = true;
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Whether the table holds no records.
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Whether a record with this identifier exists.
    pub fn contains(&self, id: &str) -> bool {
        self.rows.contains_key(id)
    }

    /// Record identifiers in insertion order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    /// Borrowing iterator over `(id, fields)` in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Fields)> {
        self.order
            .iter()
            .map(move |id| (id.as_str(), &self.rows[id]))
    }

    /// Union of field names over all records, in first-seen order.
    pub fn field_names(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for (_, fields) in self.iter() {
            for name in fields.keys() {
                if !names.iter().any(|known| known == name) {
                    names.push(name.clone());
                }
            }
        }
        names
    }

    /// Inserts or replaces a record and returns its identifier.
    ///
    /// The identifier is taken from `id`, else from an `_id` entry in
    /// `fields`, else freshly generated. Replacing keeps the original
    /// position in the insertion order. An empty identifier is rejected with
    /// [`StoreError::EmptyId`] and leaves the table untouched.
    pub fn put(&mut self, mut fields: Fields, id: Option<&str>) -> Result<String> {
        if self.read_only {
            return Err(StoreError::ReadOnlyViolation(format!(
                "put into table '{}'",
                self.name
            )));
        }
        let embedded = fields.remove(ID_FIELD).and_then(|value| value.as_key());
        let id = match (id, embedded) {
            (Some(id), _) => id.to_string(),
            (None, Some(id)) => id,
            (None, None) => self.fresh_id(),
        };
        if id.is_empty() {
            return Err(StoreError::EmptyId {
                table: self.name.clone(),
            });
        }
        if self.rows.insert(id.clone(), fields).is_none() {
            self.order.push(id.clone());
        }
        Ok(id)
    }

    /// Owned copy of a record's fields.
    pub fn get(&self, id: &str) -> Result<Fields> {
        self.rows
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::record_not_found(id))
    }

    /// Owned copy of a record.
    pub fn record(&self, id: &str) -> Result<Record> {
        self.get(id).map(|fields| Record::new(id, fields))
    }

    /// All matching records in insertion order.
    pub fn find(&self, query: &Query) -> Vec<Record> {
        self.matching(query)
            .map(|(id, fields)| Record::new(id, fields.clone()))
            .collect()
    }

    /// First matching record in insertion order.
    pub fn find_one(&self, query: &Query) -> Option<Record> {
        self.matching(query)
            .next()
            .map(|(id, fields)| Record::new(id, fields.clone()))
    }

    /// Projection of all matching records.
    pub fn project(&self, query: &Query, projection: &Projection) -> Vec<Projected> {
        self.matching(query)
            .map(|(id, fields)| project_record(id, fields, projection))
            .collect()
    }

    /// Projection of the first matching record.
    pub fn project_one(&self, query: &Query, projection: &Projection) -> Option<Projected> {
        self.matching(query)
            .next()
            .map(|(id, fields)| project_record(id, fields, projection))
    }

    /// One field per matching record; missing fields yield [`Value::Null`].
    pub fn select(&self, query: &Query, field: &str) -> Vec<Value> {
        self.matching(query)
            .map(|(id, fields)| field_value(id, fields, field))
            .collect()
    }

    /// Several fields per matching record.
    pub fn select_rows(&self, query: &Query, names: &[&str]) -> Vec<Vec<Value>> {
        self.matching(query)
            .map(|(id, fields)| {
                names
                    .iter()
                    .map(|name| field_value(id, fields, name))
                    .collect()
            })
            .collect()
    }

    fn matching<'a>(&'a self, query: &'a Query) -> impl Iterator<Item = (&'a str, &'a Fields)> {
        self.iter()
            .filter(move |(id, fields)| query.matches(id, fields))
    }

    fn fresh_id(&self) -> String {
        let mut rng = rand::thread_rng();
        loop {
            let candidate = make_uuid(&mut rng);
            if !self.rows.contains_key(&candidate) {
                return candidate;
            }
        }
    }
}

fn field_value(id: &str, fields: &Fields, name: &str) -> Value {
    if name == ID_FIELD {
        return Value::Str(id.to_string());
    }
    fields.get(name).cloned().unwrap_or(Value::Null)
}

fn project_record(id: &str, fields: &Fields, projection: &Projection) -> Projected {
    match projection {
        Projection::Field(name) => Projected::Value(field_value(id, fields, name)),
        Projection::Fields(names) => Projected::Row(
            names
                .iter()
                .map(|name| field_value(id, fields, name))
                .collect(),
        ),
    }
}

fn make_uuid<R: Rng>(rng: &mut R) -> String {
    let mut out = String::with_capacity(36);
    for (idx, len) in UUID_PARTS.iter().enumerate() {
        if idx > 0 {
            out.push('-');
        }
        for _ in 0..*len {
            out.push(HEX_DIGITS[rng.gen_range(0..HEX_DIGITS.len())] as char);
        }
    }
    out
}
