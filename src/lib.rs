//! Data directory migration run at platform startup.
//!
//! [`MigrationPipeline::run`] brings the active data root up to the running
//! version before user accounts, apps or networking start: it promotes a
//! staged import, upgrades a pre-unification `db/user.json`, imports a
//! separate install found on unrecognized hardware, then writes the version
//! marker.

pub mod config;
mod error;
mod fs_util;
pub mod logging;
pub mod migration;
pub mod paths;
pub mod pipeline;
pub mod promote;
pub mod services;
pub mod store;

pub use config::{ConfigError, MigrationConfig};
pub use error::{AppError, AppResult};
pub use fs_util::write_atomic;
pub use logging::init_logging;
pub use migration::{LegacyUserRecord, MigrationStep, StepStatus};
pub use paths::DataLayout;
pub use pipeline::{MigrationPipeline, PipelineReport, StepOutcome, StepReport};
pub use promote::{promote_directory, recover_interrupted_promotion, RecoveryAction};
pub use services::{
    AppRepositorySync, DeviceCategory, DeviceClassifier, ExternalInstalls, ServerControl,
    Services, UserAccounts,
};
pub use store::{ConfigStore, JsonFileStore, MemoryStore};
