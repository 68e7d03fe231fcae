use std::path::PathBuf;

use semver::Version;
use thiserror::Error;

use crate::paths::DataLayout;

pub const DATA_DIR_ENV: &str = "HEARTH_DATA_DIR";
pub const VERSION_ENV: &str = "HEARTH_VERSION";
const DATA_DIR_NAME: &str = "hearth";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid platform version `{value}`: {source}")]
    InvalidVersion {
        value: String,
        #[source]
        source: semver::Error,
    },
    #[error("could not determine a data directory; set HEARTH_DATA_DIR")]
    NoDataDir,
}

/// Where the active data root lives and which version it is migrated to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationConfig {
    pub data_dir: PathBuf,
    pub version: Version,
}

impl MigrationConfig {
    pub fn new(data_dir: impl Into<PathBuf>, version: Version) -> Self {
        Self {
            data_dir: data_dir.into(),
            version,
        }
    }

    /// Resolve from `HEARTH_DATA_DIR` / `HEARTH_VERSION`, falling back to the
    /// platform data directory and this crate's version.
    pub fn from_env() -> Result<Self, ConfigError> {
        let data_dir = match std::env::var_os(DATA_DIR_ENV) {
            Some(dir) if !dir.is_empty() => PathBuf::from(dir),
            _ => dirs::data_dir()
                .map(|base| base.join(DATA_DIR_NAME))
                .ok_or(ConfigError::NoDataDir)?,
        };
        let raw_version =
            std::env::var(VERSION_ENV).unwrap_or_else(|_| env!("CARGO_PKG_VERSION").to_string());
        Ok(Self::new(data_dir, parse_version(&raw_version)?))
    }

    pub fn layout(&self) -> DataLayout {
        DataLayout::new(self.data_dir.clone())
    }
}

pub fn parse_version(raw: &str) -> Result<Version, ConfigError> {
    let trimmed = raw.trim();
    let trimmed = trimmed.strip_prefix('v').unwrap_or(trimmed);
    Version::parse(trimmed).map_err(|source| ConfigError::InvalidVersion {
        value: raw.to_string(),
        source,
    })
}
