use tracing::{debug, info};

use crate::migration::StepStatus;
use crate::paths::DataLayout;
use crate::services::Services;
use crate::AppResult;

/// Pull data from a separate install on the same machine into a fresh one.
///
/// Only runs on hardware that is not a first-party model and only before a
/// user has been registered; known devices that merely lack a user yet are
/// left alone.
pub async fn import_external_install(
    layout: &DataLayout,
    services: &Services,
) -> AppResult<StepStatus> {
    let device = services.device.detect().await?;
    if device.is_recognized() {
        debug!(
            target: "hearth",
            event = "external_install_skipped",
            reason = "recognized_device",
            device = %device
        );
        return Ok(StepStatus::NotNeeded);
    }

    if services.users.exists().await? {
        debug!(
            target: "hearth",
            event = "external_install_skipped",
            reason = "user_exists"
        );
        return Ok(StepStatus::NotNeeded);
    }

    info!(
        target: "hearth",
        event = "external_install_search",
        device = %device
    );
    let Some(external) = services.external_installs.find().await? else {
        info!(target: "hearth", event = "external_install_not_found");
        return Ok(StepStatus::NotNeeded);
    };
    info!(
        target: "hearth",
        event = "external_install_found",
        path = %external.display()
    );

    let current = layout.root();
    services
        .external_installs
        .run_pre_migration_checks(current, &external)
        .await
        .map_err(|err| err.with_context("operation", "external_pre_migration_checks"))?;
    // Started early so a connected client can follow the copy's progress.
    services
        .server
        .start()
        .await
        .map_err(|err| err.with_context("operation", "external_start_server"))?;
    services
        .external_installs
        .migrate_data(current, &external)
        .await
        .map_err(|err| {
            err.with_context("operation", "external_migrate_data")
                .with_context("external", external.display().to_string())
        })?;

    info!(
        target: "hearth",
        event = "external_install_migrated",
        path = %external.display()
    );
    Ok(StepStatus::Applied)
}
