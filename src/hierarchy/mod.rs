//! Administrative hierarchy of an election dataset.
//!
//! Voivodships contain districts, districts contain communes, communes
//! contain polling districts. Constituencies group whole districts of a
//! single voivodship and own the candidates and the per-constituency results
//! tables.

mod index;
mod schema;

pub use index::{Ambiguity, HierarchyIndex, UnitClosure};
pub use schema::{EntityKind, Granularity, LinkFields, Schema, TableNames};
