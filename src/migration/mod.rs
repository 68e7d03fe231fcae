pub mod activate;
pub mod external;
pub mod legacy;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use activate::activate_staged_import;
pub use external::import_external_install;
pub use legacy::{
    parse_legacy_record, upgrade_legacy_data, LegacyUserRecord, DEFAULT_MIGRATED_WIDGETS,
};

/// The fault-isolated steps the pipeline runs, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MigrationStep {
    ActivateStagedImport,
    UpgradeLegacyData,
    ImportExternalInstall,
}

impl MigrationStep {
    /// Later steps read filesystem state left by earlier ones.
    pub const ORDER: [MigrationStep; 3] = [
        MigrationStep::ActivateStagedImport,
        MigrationStep::UpgradeLegacyData,
        MigrationStep::ImportExternalInstall,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            MigrationStep::ActivateStagedImport => "activate_staged_import",
            MigrationStep::UpgradeLegacyData => "upgrade_legacy_data",
            MigrationStep::ImportExternalInstall => "import_external_install",
        }
    }

    /// Phrase used in operator-facing failure messages.
    pub const fn describe(self) -> &'static str {
        match self {
            MigrationStep::ActivateStagedImport => "Failed to activate imported data",
            MigrationStep::UpgradeLegacyData => "Failed to migrate legacy data",
            MigrationStep::ImportExternalInstall => "Failed to migrate external install data",
        }
    }
}

impl fmt::Display for MigrationStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a step that did not fail ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    /// The step found work and finished it.
    Applied,
    /// The step's trigger was absent; nothing was touched.
    NotNeeded,
}

impl StepStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            StepStatus::Applied => "applied",
            StepStatus::NotNeeded => "not_needed",
        }
    }
}
