//! Capabilities the pipeline borrows from sibling subsystems.
//!
//! Each collaborator is a narrow trait so the pipeline can run against real
//! subsystems at boot and against recording fakes in tests.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::store::ConfigStore;
use crate::AppResult;

/// Hardware family reported by the device classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeviceCategory {
    Home,
    RaspberryPi,
    /// Hardware that is not one of the first-party models.
    Unknown,
}

impl DeviceCategory {
    pub const fn as_str(self) -> &'static str {
        match self {
            DeviceCategory::Home => "home",
            DeviceCategory::RaspberryPi => "raspberry-pi",
            DeviceCategory::Unknown => "unknown",
        }
    }

    pub const fn is_recognized(self) -> bool {
        !matches!(self, DeviceCategory::Unknown)
    }
}

impl fmt::Display for DeviceCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[async_trait]
pub trait DeviceClassifier: Send + Sync {
    async fn detect(&self) -> AppResult<DeviceCategory>;
}

#[async_trait]
pub trait UserAccounts: Send + Sync {
    async fn exists(&self) -> AppResult<bool>;
    async fn set_name(&self, name: &str) -> AppResult<()>;
    /// Store a password that is already hashed; it is not hashed again.
    async fn set_hashed_password(&self, hash: &str) -> AppResult<()>;
    async fn enable_two_factor(&self, otp_uri: &str) -> AppResult<()>;
}

#[async_trait]
pub trait AppRepositorySync: Send + Sync {
    /// Pull every configured app repository and wait for it to finish.
    async fn update(&self) -> AppResult<()>;
}

/// Locating and copying a separate install on the same machine.
#[async_trait]
pub trait ExternalInstalls: Send + Sync {
    async fn find(&self) -> AppResult<Option<PathBuf>>;
    /// Fail if `external` cannot be imported into `current`.
    async fn run_pre_migration_checks(&self, current: &Path, external: &Path) -> AppResult<()>;
    /// Recursively copy the data of `external` into `current`.
    async fn migrate_data(&self, current: &Path, external: &Path) -> AppResult<()>;
}

#[async_trait]
pub trait ServerControl: Send + Sync {
    async fn start(&self) -> AppResult<()>;
}

/// Every collaborator the pipeline needs, passed in rather than reached for.
#[derive(Clone)]
pub struct Services {
    pub device: Arc<dyn DeviceClassifier>,
    pub users: Arc<dyn UserAccounts>,
    pub store: Arc<dyn ConfigStore>,
    pub app_repositories: Arc<dyn AppRepositorySync>,
    pub external_installs: Arc<dyn ExternalInstalls>,
    pub server: Arc<dyn ServerControl>,
}
