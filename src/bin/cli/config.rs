use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Settings read from `cli.toml`; command line flags take precedence.
#[derive(Debug, Default)]
pub struct CliConfig {
    path: Option<PathBuf>,
    data: RawConfig,
}

impl CliConfig {
    pub fn load(explicit: Option<PathBuf>) -> Result<Self, ConfigError> {
        let path = explicit.or_else(default_config_path);
        let data = match path.as_ref() {
            Some(config_path) if config_path.exists() => read_file(config_path)?,
            _ => RawConfig::default(),
        };
        Ok(Self { path, data })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn default_db_path(&self) -> Option<&PathBuf> {
        self.data.store.default_path.as_ref()
    }

    pub fn schema_path(&self) -> Option<&PathBuf> {
        self.data.store.schema.as_ref()
    }

    pub fn delimiter(&self) -> Result<Option<u8>, ConfigError> {
        match self.data.store.delimiter.as_deref() {
            None => Ok(None),
            Some(raw) => match raw.as_bytes() {
                [byte] => Ok(Some(*byte)),
                _ => Err(ConfigError::InvalidDelimiter {
                    value: raw.to_string(),
                }),
            },
        }
    }

    pub fn load_limit(&self) -> Option<usize> {
        self.data.store.load_limit
    }
}

fn read_file(path: &Path) -> Result<RawConfig, ConfigError> {
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

#[derive(Debug, Default, Deserialize, Serialize)]
struct RawConfig {
    #[serde(default)]
    store: StoreSection,
}

#[derive(Debug, Default, Deserialize, Serialize)]
struct StoreSection {
    #[serde(rename = "default")]
    default_path: Option<PathBuf>,
    schema: Option<PathBuf>,
    delimiter: Option<String>,
    load_limit: Option<usize>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read CLI config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse CLI config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("delimiter must be a single byte, got '{value}'")]
    InvalidDelimiter { value: String },
}

pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|base| base.join("pkwstore").join("cli.toml"))
}
