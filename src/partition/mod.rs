//! Splits a store into one self-contained sub-store per administrative unit.
//!
//! Each sub-store holds deep copies of exactly the records related to its
//! unit, under the original table names and IDs, so per-unit analyses can
//! run against it without reaching back into the full dataset.

use std::collections::HashSet;

use rayon::prelude::*;
use tracing::{debug, trace};

use crate::error::Result;
use crate::hierarchy::{EntityKind, Granularity, HierarchyIndex, UnitClosure};
use crate::storage::{Record, Store};

/// One unit together with its sub-store.
#[derive(Debug)]
pub struct Partition {
    /// The unit record itself.
    pub unit: Record,
    /// Read-only store holding every record related to the unit.
    pub store: Store,
}

/// Builds per-unit sub-stores from a read-only store and its index.
#[derive(Clone, Copy, Debug)]
pub struct Partitioner<'a> {
    store: &'a Store,
    index: &'a HierarchyIndex,
}

impl<'a> Partitioner<'a> {
    /// Pairs a store with the index built from it.
    pub fn new(store: &'a Store, index: &'a HierarchyIndex) -> Self {
        Self { store, index }
    }

    /// Unit IDs at `granularity`, in table order.
    pub fn enumerate(&self, granularity: Granularity) -> Result<Vec<String>> {
        let name = self.index.schema().table(granularity.kind());
        Ok(match self.store.table_opt(name)? {
            Some(table) => table.ids().map(str::to_string).collect(),
            None => Vec::new(),
        })
    }

    /// Unit IDs at `granularity` that fall inside the parent unit
    /// `parent_id` at `parent_granularity`, in table order.
    ///
    /// A parent below `granularity` yields the units containing it. An
    /// unknown parent is [`StoreError::NotFound`](crate::StoreError::NotFound).
    pub fn units_within(
        &self,
        granularity: Granularity,
        parent_granularity: Granularity,
        parent_id: &str,
    ) -> Result<Vec<String>> {
        let closure = self.index.closure(parent_granularity, parent_id)?;
        let inside: HashSet<&str> = closure
            .ids(granularity.kind())
            .iter()
            .map(String::as_str)
            .collect();
        let units: Vec<String> = self
            .enumerate(granularity)?
            .into_iter()
            .filter(|unit| inside.contains(unit.as_str()))
            .collect();
        debug!(
            %granularity,
            parent = %parent_granularity,
            parent_id,
            units = units.len(),
            "restricted units to parent"
        );
        Ok(units)
    }

    /// Lazy sequence of partitions, one per unit.
    ///
    /// Sub-stores are built on demand; cloning the returned iterator restarts
    /// from its current position.
    pub fn partition(&self, granularity: Granularity) -> Result<Partitions<'a>> {
        let units = self.enumerate(granularity)?;
        debug!(%granularity, units = units.len(), "partitioning store");
        Ok(self.partitions(granularity, units))
    }

    /// Like [`partition`](Self::partition), limited to the units inside one
    /// parent unit.
    pub fn partition_within(
        &self,
        granularity: Granularity,
        parent_granularity: Granularity,
        parent_id: &str,
    ) -> Result<Partitions<'a>> {
        let units = self.units_within(granularity, parent_granularity, parent_id)?;
        Ok(self.partitions(granularity, units))
    }

    fn partitions(&self, granularity: Granularity, units: Vec<String>) -> Partitions<'a> {
        Partitions {
            partitioner: *self,
            granularity,
            units,
            position: 0,
        }
    }

    /// Builds the partition of a single unit.
    pub fn build(&self, granularity: Granularity, unit: &str) -> Result<Partition> {
        let closure = self.index.closure(granularity, unit)?;
        let record = self
            .store
            .table(self.index.schema().table(granularity.kind()))?
            .record(unit)?;
        let store = self.sub_store(&closure)?;
        trace!(%granularity, unit, "built partition");
        Ok(Partition {
            unit: record,
            store,
        })
    }

    /// Applies `f` to every unit's partition in parallel.
    ///
    /// Results are returned in unit order, paired with the unit ID. The first
    /// error aborts the run.
    pub fn map_units<T, F>(&self, granularity: Granularity, f: F) -> Result<Vec<(String, T)>>
    where
        F: Fn(&Record, &Store) -> T + Sync,
        T: Send,
    {
        // Load everything up front so workers only ever take read locks.
        self.store.load_all()?;
        let units = self.enumerate(granularity)?;
        self.map_over(granularity, &units, f)
    }

    /// Like [`map_units`](Self::map_units), limited to the units inside one
    /// parent unit.
    pub fn map_units_within<T, F>(
        &self,
        granularity: Granularity,
        parent_granularity: Granularity,
        parent_id: &str,
        f: F,
    ) -> Result<Vec<(String, T)>>
    where
        F: Fn(&Record, &Store) -> T + Sync,
        T: Send,
    {
        self.store.load_all()?;
        let units = self.units_within(granularity, parent_granularity, parent_id)?;
        self.map_over(granularity, &units, f)
    }

    fn map_over<T, F>(
        &self,
        granularity: Granularity,
        units: &[String],
        f: F,
    ) -> Result<Vec<(String, T)>>
    where
        F: Fn(&Record, &Store) -> T + Sync,
        T: Send,
    {
        units
            .par_iter()
            .map(|unit| -> Result<(String, T)> {
                let partition = self.build(granularity, unit)?;
                Ok((unit.clone(), f(&partition.unit, &partition.store)))
            })
            .collect()
    }

    fn sub_store(&self, closure: &UnitClosure) -> Result<Store> {
        let schema = self.index.schema();
        let mut sub = Store::empty(false);
        for kind in EntityKind::ALL {
            self.copy_records(&mut sub, schema.table(kind), closure.ids(kind))?;
        }
        for (table, rows) in &closure.results {
            self.copy_records(&mut sub, table, rows)?;
        }
        sub.freeze();
        Ok(sub)
    }

    fn copy_records(&self, sub: &mut Store, name: &str, ids: &[String]) -> Result<()> {
        let source = self.store.table_opt(name)?;
        let target = sub.create_table(name)?;
        if let Some(source) = source {
            for id in ids {
                target.put(source.get(id)?, Some(id))?;
            }
        }
        Ok(())
    }
}

/// Iterator over the partitions of one granularity.
#[derive(Clone, Debug)]
pub struct Partitions<'a> {
    partitioner: Partitioner<'a>,
    granularity: Granularity,
    units: Vec<String>,
    position: usize,
}

impl Partitions<'_> {
    /// Unit IDs this iterator walks, in order.
    pub fn units(&self) -> &[String] {
        &self.units
    }
}

impl Iterator for Partitions<'_> {
    type Item = Result<Partition>;

    fn next(&mut self) -> Option<Self::Item> {
        let unit = self.units.get(self.position)?;
        self.position += 1;
        Some(self.partitioner.build(self.granularity, unit))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.units.len() - self.position;
        (left, Some(left))
    }
}

impl ExactSizeIterator for Partitions<'_> {}
