use std::collections::{BTreeMap, BTreeSet};
use std::ffi::OsStr;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::error::{Result, StoreError};

use super::codec::{self, TABLE_EXTENSION};
use super::options::StoreOptions;
use super::table::Table;

#[derive(Debug)]
enum TableSlot {
    NotLoaded,
    Loaded { table: Arc<Table>, dirty: bool },
}

/// Directory-backed collection of tables.
///
/// Table files are registered on open and parsed on first access. Loaded
/// tables are shared as `Arc<Table>`; writers get a private copy through
/// [`Store::table_mut`] whenever a reader still holds the old one.
#[derive(Debug)]
pub struct Store {
    directory: Option<PathBuf>,
    options: StoreOptions,
    slots: RwLock<BTreeMap<String, TableSlot>>,
    pending_deletion: BTreeSet<String>,
}

impl Store {
    /// Opens a store over `directory` with default options.
    pub fn open(directory: impl AsRef<Path>, read_only: bool) -> Result<Self> {
        Self::open_with_options(
            directory,
            StoreOptions {
                read_only,
                ..StoreOptions::default()
            },
        )
    }

    /// Opens a store over `directory`.
    ///
    /// Every `*.csv` file becomes a not-yet-loaded table. A missing directory
    /// is created for writable stores and is an error for read-only ones.
    pub fn open_with_options(directory: impl AsRef<Path>, options: StoreOptions) -> Result<Self> {
        let directory = directory.as_ref().to_path_buf();
        if !directory.exists() {
            if options.read_only || !options.create_if_missing {
                return Err(StoreError::MissingDirectory(directory));
            }
            fs::create_dir_all(&directory)?;
            info!(path = %directory.display(), "created store directory");
        }

        let mut slots = BTreeMap::new();
        for entry in fs::read_dir(&directory)? {
            let path = entry?.path();
            if !path.is_file() || path.extension() != Some(OsStr::new(TABLE_EXTENSION)) {
                continue;
            }
            match path.file_stem().and_then(OsStr::to_str) {
                Some(name) => {
                    slots.insert(name.to_string(), TableSlot::NotLoaded);
                }
                None => warn!(path = %path.display(), "skipping table file with non UTF-8 name"),
            }
        }
        debug!(
            path = %directory.display(),
            tables = slots.len(),
            read_only = options.read_only,
            "opened store"
        );
        Ok(Self {
            directory: Some(directory),
            options,
            slots: RwLock::new(slots),
            pending_deletion: BTreeSet::new(),
        })
    }

    /// Creates an in-memory store with no backing directory.
    pub fn empty(read_only: bool) -> Self {
        Self {
            directory: None,
            options: StoreOptions {
                read_only,
                ..StoreOptions::default()
            },
            slots: RwLock::new(BTreeMap::new()),
            pending_deletion: BTreeSet::new(),
        }
    }

    /// Whether the store refuses mutations.
    pub fn is_read_only(&self) -> bool {
        self.options.read_only
    }

    /// Backing directory, if any.
    pub fn directory(&self) -> Option<&Path> {
        self.directory.as_deref()
    }

    /// Makes the store and every table in it read-only.
    pub fn freeze(&mut self) {
        self.options.read_only = true;
        for slot in self.slots.get_mut().values_mut() {
            if let TableSlot::Loaded { table, .. } = slot {
                Arc::make_mut(table).freeze();
            }
        }
    }

    /// Names of all registered tables, sorted.
    pub fn table_names(&self) -> Vec<String> {
        self.slots.read().keys().cloned().collect()
    }

    /// Whether a table is registered under `name`.
    pub fn has_table(&self, name: &str) -> bool {
        self.slots.read().contains_key(name)
    }

    /// Returns a table, loading it from disk on first access.
    pub fn table(&self, name: &str) -> Result<Arc<Table>> {
        {
            let slots = self.slots.read();
            match slots.get(name) {
                None => return Err(StoreError::table_not_found(name)),
                Some(TableSlot::Loaded { table, .. }) => return Ok(Arc::clone(table)),
                Some(TableSlot::NotLoaded) => {}
            }
        }
        let mut slots = self.slots.write();
        if let Some(TableSlot::Loaded { table, .. }) = slots.get(name) {
            return Ok(Arc::clone(table));
        }
        let table = Arc::new(self.load(name)?);
        slots.insert(
            name.to_string(),
            TableSlot::Loaded {
                table: Arc::clone(&table),
                dirty: false,
            },
        );
        Ok(table)
    }

    /// Like [`Store::table`], but an unknown name yields `None`.
    pub fn table_opt(&self, name: &str) -> Result<Option<Arc<Table>>> {
        if !self.has_table(name) {
            return Ok(None);
        }
        self.table(name).map(Some)
    }

    /// Loads every registered table.
    pub fn load_all(&self) -> Result<()> {
        for name in self.table_names() {
            self.table(&name)?;
        }
        Ok(())
    }

    /// Mutable access to a table; the table is written on the next [`Store::dump`].
    pub fn table_mut(&mut self, name: &str) -> Result<&mut Table> {
        self.ensure_writable(&format!("modify table '{name}'"))?;
        if matches!(self.slots.get_mut().get(name), Some(TableSlot::NotLoaded)) {
            let table = self.load(name)?;
            self.slots.get_mut().insert(
                name.to_string(),
                TableSlot::Loaded {
                    table: Arc::new(table),
                    dirty: false,
                },
            );
        }
        match self.slots.get_mut().get_mut(name) {
            Some(TableSlot::Loaded { table, dirty }) => {
                *dirty = true;
                Ok(Arc::make_mut(table))
            }
            _ => Err(StoreError::table_not_found(name)),
        }
    }

    /// Creates an empty table, replacing any table of the same name.
    pub fn create_table(&mut self, name: &str) -> Result<&mut Table> {
        self.ensure_writable(&format!("create table '{name}'"))?;
        self.pending_deletion.remove(name);
        let slots = self.slots.get_mut();
        slots.insert(
            name.to_string(),
            TableSlot::Loaded {
                table: Arc::new(Table::new(name)),
                dirty: true,
            },
        );
        match slots.get_mut(name) {
            Some(TableSlot::Loaded { table, .. }) => Ok(Arc::make_mut(table)),
            _ => Err(StoreError::table_not_found(name)),
        }
    }

    /// Drops a table now; its file is removed on the next [`Store::dump`].
    pub fn delete_table(&mut self, name: &str) -> Result<()> {
        self.ensure_writable(&format!("delete table '{name}'"))?;
        if self.slots.get_mut().remove(name).is_none() {
            return Err(StoreError::table_not_found(name));
        }
        self.pending_deletion.insert(name.to_string());
        Ok(())
    }

    /// Persists pending deletions and every created or modified table.
    ///
    /// Tables that were only read are left on disk untouched.
    pub fn dump(&mut self) -> Result<()> {
        self.ensure_writable("dump store")?;
        let directory = self.directory.clone().ok_or(StoreError::Detached)?;
        let delimiter = self.options.delimiter;

        let mut deleted = 0usize;
        for name in std::mem::take(&mut self.pending_deletion) {
            match fs::remove_file(table_path(&directory, &name)) {
                Ok(()) => deleted += 1,
                Err(err) if err.kind() == io::ErrorKind::NotFound => {}
                Err(err) => return Err(err.into()),
            }
        }

        let mut written = 0usize;
        for (name, slot) in self.slots.get_mut().iter_mut() {
            if let TableSlot::Loaded { table, dirty } = slot {
                if *dirty {
                    codec::write_table(&table_path(&directory, name), table, delimiter)?;
                    *dirty = false;
                    written += 1;
                }
            }
        }
        info!(path = %directory.display(), written, deleted, "dumped store");
        Ok(())
    }

    /// Removes every table file and then the directory itself.
    pub fn destroy(mut self) -> Result<()> {
        self.ensure_writable("destroy store")?;
        let directory = self.directory.take().ok_or(StoreError::Detached)?;
        let names: BTreeSet<String> = self
            .slots
            .get_mut()
            .keys()
            .cloned()
            .chain(self.pending_deletion.iter().cloned())
            .collect();
        for name in names {
            match fs::remove_file(table_path(&directory, &name)) {
                Ok(()) => {}
                Err(err) if err.kind() == io::ErrorKind::NotFound => {}
                Err(err) => return Err(err.into()),
            }
        }
        fs::remove_dir(&directory)?;
        info!(path = %directory.display(), "destroyed store");
        Ok(())
    }

    fn ensure_writable(&self, action: &str) -> Result<()> {
        if self.options.read_only {
            return Err(StoreError::ReadOnlyViolation(format!(
                "cannot {action} on a read-only store"
            )));
        }
        Ok(())
    }

    fn load(&self, name: &str) -> Result<Table> {
        let directory = self.directory.as_deref().ok_or(StoreError::Detached)?;
        let mut table = codec::read_table(
            &table_path(directory, name),
            name,
            self.options.delimiter,
            self.options.load_limit,
        )?;
        if self.options.read_only {
            table.freeze();
        }
        Ok(table)
    }

    #[cfg(test)]
    fn is_loaded(&self, name: &str) -> bool {
        matches!(self.slots.read().get(name), Some(TableSlot::Loaded { .. }))
    }
}

fn table_path(directory: &Path, name: &str) -> PathBuf {
    directory.join(format!("{name}.{TABLE_EXTENSION}"))
}
