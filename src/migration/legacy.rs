//! Upgrade for data directories written before the unified config store.
//!
//! Those installs kept the account and a handful of settings in
//! `db/user.json`. The file is the only trigger: once its contents are in the
//! store it is renamed to `user.json.migrated`, together with `.env`, and is
//! never looked at again.

use std::io;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::json;
use tracing::{debug, info};

use crate::fs_util::rename_replacing;
use crate::migration::StepStatus;
use crate::paths::DataLayout;
use crate::services::Services;
use crate::store::{APPS_KEY, APP_REPOSITORIES_KEY, TOR_ENABLED_KEY, WIDGETS_KEY};
use crate::{AppError, AppResult};

/// Widgets seeded for every migrated user so the dashboard is not empty.
pub const DEFAULT_MIGRATED_WIDGETS: [&str; 3] =
    ["hearth:memory", "hearth:system-stats", "hearth:storage"];

pub const LEGACY_INVALID_CODE: &str = "MIGRATION/LEGACY_INVALID";

/// The `db/user.json` shape. Unknown keys are ignored; optional keys may be
/// absent but never `null`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyUserRecord {
    pub name: String,
    /// Already hashed by the legacy install.
    pub password: String,
    #[serde(
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub installed_apps: Option<Vec<String>>,
    pub repos: Vec<String>,
    #[serde(
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub remote_tor_access: Option<bool>,
    #[serde(
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub otp_uri: Option<String>,
}

impl LegacyUserRecord {
    /// The stored OTP URI, if two-factor was actually enabled. An empty
    /// string means it never was.
    pub fn two_factor_uri(&self) -> Option<&str> {
        self.otp_uri.as_deref().filter(|uri| !uri.is_empty())
    }
}

/// Only runs when the key is present, so `null` reaches `T` and is rejected.
fn present<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}

/// Parse and validate the whole record before anything is applied.
pub fn parse_legacy_record(raw: &[u8]) -> AppResult<LegacyUserRecord> {
    serde_json::from_slice(raw).map_err(|err| {
        AppError::new(
            LEGACY_INVALID_CODE,
            "Legacy user record does not match the expected shape",
        )
        .with_cause(err)
    })
}

pub async fn upgrade_legacy_data(layout: &DataLayout, services: &Services) -> AppResult<StepStatus> {
    let path = layout.legacy_user_file();
    let raw = match tokio::fs::read(&path).await {
        Ok(raw) => raw,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(StepStatus::NotNeeded),
        Err(err) => return Err(AppError::io(err, "legacy_read_user_record", &path)),
    };
    info!(
        target: "hearth",
        event = "legacy_data_found",
        path = %path.display()
    );

    let record = parse_legacy_record(&raw)
        .map_err(|err| err.with_context("path", path.display().to_string()))?;
    apply_legacy_record(&record, services).await?;
    tombstone_legacy_files(layout)?;

    info!(
        target: "hearth",
        event = "legacy_data_migrated",
        two_factor = record.two_factor_uri().is_some(),
        repos = record.repos.len(),
        apps = record.installed_apps.as_ref().map_or(0, Vec::len)
    );
    Ok(StepStatus::Applied)
}

/// Write the record into the user module and store. Every call overwrites
/// rather than appends, so a run cut short before the tombstone can be
/// repeated from the start.
async fn apply_legacy_record(record: &LegacyUserRecord, services: &Services) -> AppResult<()> {
    let users = &services.users;
    let store = &services.store;

    users
        .set_name(&record.name)
        .await
        .map_err(|err| err.with_context("operation", "legacy_set_name"))?;
    users
        .set_hashed_password(&record.password)
        .await
        .map_err(|err| err.with_context("operation", "legacy_set_password"))?;
    if let Some(otp_uri) = record.two_factor_uri() {
        users
            .enable_two_factor(otp_uri)
            .await
            .map_err(|err| err.with_context("operation", "legacy_enable_two_factor"))?;
    }

    store
        .set(APP_REPOSITORIES_KEY, json!(record.repos))
        .await
        .map_err(|err| err.with_context("operation", "legacy_store_repositories"))?;
    if let Some(apps) = &record.installed_apps {
        store
            .set(APPS_KEY, json!(apps))
            .await
            .map_err(|err| err.with_context("operation", "legacy_store_apps"))?;
    }
    if record.remote_tor_access == Some(true) {
        store
            .set(TOR_ENABLED_KEY, json!(true))
            .await
            .map_err(|err| err.with_context("operation", "legacy_store_tor"))?;
    }
    store
        .set(WIDGETS_KEY, json!(DEFAULT_MIGRATED_WIDGETS))
        .await
        .map_err(|err| err.with_context("operation", "legacy_store_widgets"))?;

    // Apps restored from the record must resolve before the app subsystem
    // starts them, so wait for the first pull here.
    services
        .app_repositories
        .update()
        .await
        .map_err(|err| err.with_context("operation", "legacy_update_repositories"))?;
    Ok(())
}

fn tombstone_legacy_files(layout: &DataLayout) -> AppResult<()> {
    let user_file = layout.legacy_user_file();
    rename_replacing(
        &user_file,
        &layout.legacy_user_tombstone(),
        "legacy_tombstone_user_record",
    )?;

    // Old environment variables must not leak into the new install.
    let env_file = layout.env_file();
    if env_file.exists() {
        rename_replacing(&env_file, &layout.env_tombstone(), "legacy_tombstone_env")?;
    } else {
        debug!(
            target: "hearth",
            event = "legacy_env_missing",
            path = %env_file.display()
        );
    }
    Ok(())
}
