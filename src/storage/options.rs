/// Options used when opening a [`super::Store`] over a directory.
#[derive(Clone, Debug)]
pub struct StoreOptions {
    /// Refuse every mutation and never touch the directory.
    pub read_only: bool,
    /// Create the directory when it does not exist (ignored for read-only stores).
    pub create_if_missing: bool,
    /// Load at most this many rows from each table file.
    pub load_limit: Option<usize>,
    /// Field delimiter of table files.
    pub delimiter: u8,
}

impl StoreOptions {
    /// Defaults with `read_only` set.
    pub fn read_only() -> Self {
        Self {
            read_only: true,
            ..Self::default()
        }
    }
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            read_only: false,
            create_if_missing: true,
            load_limit: None,
            delimiter: b';',
        }
    }
}
