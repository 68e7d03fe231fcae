use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::time::Instant;

use chrono::{SecondsFormat, Utc};
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::task::JoinError;
use tracing::{error, info};

use crate::config::MigrationConfig;
use crate::migration::{
    activate_staged_import, import_external_install, upgrade_legacy_data, MigrationStep,
    StepStatus,
};
use crate::paths::DataLayout;
use crate::services::Services;
use crate::store::VERSION_KEY;
use crate::{AppError, AppResult};

pub const DATA_DIR_CODE: &str = "MIGRATION/DATA_DIR";
pub const VERSION_MARKER_CODE: &str = "MIGRATION/VERSION_MARKER";
pub const STEP_PANIC_CODE: &str = "MIGRATION/PANIC";
pub const STEP_CANCELLED_CODE: &str = "MIGRATION/CANCELLED";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StepOutcome {
    Applied,
    NotNeeded,
    Failed { code: String, message: String },
}

impl From<StepStatus> for StepOutcome {
    fn from(status: StepStatus) -> Self {
        match status {
            StepStatus::Applied => StepOutcome::Applied,
            StepStatus::NotNeeded => StepOutcome::NotNeeded,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepReport {
    pub step: MigrationStep,
    pub outcome: StepOutcome,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineReport {
    pub version: String,
    pub started_at: String,
    pub steps: Vec<StepReport>,
}

impl PipelineReport {
    pub fn outcome(&self, step: MigrationStep) -> Option<&StepOutcome> {
        self.steps
            .iter()
            .find(|report| report.step == step)
            .map(|report| &report.outcome)
    }

    pub fn failed_steps(&self) -> Vec<MigrationStep> {
        self.steps
            .iter()
            .filter(|report| matches!(report.outcome, StepOutcome::Failed { .. }))
            .map(|report| report.step)
            .collect()
    }
}

/// Brings the data directory up to the running version before any other
/// subsystem starts.
///
/// Must be run exactly once per process, before anything else writes to the
/// data directory; nothing here locks against concurrent writers.
pub struct MigrationPipeline {
    config: MigrationConfig,
    services: Services,
}

impl MigrationPipeline {
    pub fn new(config: MigrationConfig, services: Services) -> Self {
        Self { config, services }
    }

    pub fn config(&self) -> &MigrationConfig {
        &self.config
    }

    /// Run every step in order.
    ///
    /// Step failures are logged and recorded in the report but never returned.
    /// Only an uncreatable data directory or an unwritable version marker is
    /// an error: either means no state can be persisted at all.
    pub async fn run(&self) -> AppResult<PipelineReport> {
        let layout = self.config.layout();
        let version = self.config.version.to_string();
        let started_at = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
        let started = Instant::now();
        info!(
            target: "hearth",
            event = "migration_start",
            data_dir = %layout.root().display(),
            version = %version,
            git_hash = env!("HEARTH_GIT_HASH")
        );

        ensure_data_dir(&layout).await?;

        let mut steps = Vec::with_capacity(MigrationStep::ORDER.len());
        for step in MigrationStep::ORDER {
            steps.push(self.run_step(step, &layout).await);
        }

        self.write_version_marker(&version).await?;

        let report = PipelineReport {
            version,
            started_at,
            steps,
        };
        info!(
            target: "hearth",
            event = "migration_complete",
            version = %report.version,
            failed_steps = report.failed_steps().len(),
            duration_ms = started.elapsed().as_millis() as u64
        );
        Ok(report)
    }

    async fn run_step(&self, step: MigrationStep, layout: &DataLayout) -> StepReport {
        let started = Instant::now();
        let attempt = async {
            match step {
                MigrationStep::ActivateStagedImport => {
                    let layout = layout.clone();
                    tokio::task::spawn_blocking(move || activate_staged_import(&layout))
                        .await
                        .unwrap_or_else(|err| Err(join_failure(err)))
                }
                MigrationStep::UpgradeLegacyData => upgrade_legacy_data(layout, &self.services).await,
                MigrationStep::ImportExternalInstall => {
                    import_external_install(layout, &self.services).await
                }
            }
        };
        let result = match AssertUnwindSafe(attempt).catch_unwind().await {
            Ok(result) => result,
            Err(panic) => Err(AppError::new(STEP_PANIC_CODE, panic_message(panic.as_ref()))),
        };
        let duration_ms = started.elapsed().as_millis() as u64;

        let outcome = match result {
            Ok(status) => {
                info!(
                    target: "hearth",
                    event = "migration_step_finished",
                    step = step.as_str(),
                    outcome = status.as_str(),
                    duration_ms
                );
                StepOutcome::from(status)
            }
            Err(err) => {
                error!(
                    target: "hearth",
                    event = "migration_step_failed",
                    step = step.as_str(),
                    code = err.code(),
                    error = %err,
                    duration_ms,
                    "{}: {}",
                    step.describe(),
                    err.message()
                );
                StepOutcome::Failed {
                    code: err.code().to_string(),
                    message: err.message().to_string(),
                }
            }
        };

        StepReport {
            step,
            outcome,
            duration_ms,
        }
    }

    /// Also the first write to the store on a fresh install, so a failure
    /// here means the store is not writable.
    async fn write_version_marker(&self, version: &str) -> AppResult<()> {
        self.services
            .store
            .set(VERSION_KEY, json!(version))
            .await
            .map_err(|err| {
                error!(
                    target: "hearth",
                    event = "migration_version_marker_failed",
                    version = %version,
                    error = %err
                );
                AppError::new(VERSION_MARKER_CODE, "Failed to write the version marker")
                    .with_context("version", version)
                    .with_cause(err)
            })
    }
}

async fn ensure_data_dir(layout: &DataLayout) -> AppResult<()> {
    let root = layout.root();
    tokio::fs::create_dir_all(root).await.map_err(|err| {
        error!(
            target: "hearth",
            event = "migration_data_dir_failed",
            path = %root.display(),
            error = %err
        );
        AppError::new(DATA_DIR_CODE, "Failed to create the data directory")
            .with_context("path", root.display().to_string())
            .with_cause(err)
    })
}

/// A blocking step that panicked is reported like a panic on the runtime.
fn join_failure(err: JoinError) -> AppError {
    if err.is_panic() {
        AppError::new(STEP_PANIC_CODE, panic_message(err.into_panic().as_ref()))
    } else {
        AppError::new(STEP_CANCELLED_CODE, err.to_string())
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "step panicked".to_string()
    }
}
