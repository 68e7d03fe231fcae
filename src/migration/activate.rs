use tracing::{debug, info, warn};

use crate::migration::StepStatus;
use crate::paths::DataLayout;
use crate::promote::{promote_directory, recover_interrupted_promotion, RecoveryAction};
use crate::AppResult;

/// Replace the data root with `<root>/import` when an external import process
/// has staged one there.
///
/// Leftovers from a promotion interrupted on a previous boot are resolved
/// first, so a staged import that was already moved to the temp sibling is
/// still activated.
pub fn activate_staged_import(layout: &DataLayout) -> AppResult<StepStatus> {
    let staged = layout.import_dir();
    let active = layout.root();

    let recovered = match recover_interrupted_promotion(&staged, active)? {
        RecoveryAction::CompletedPromotion => {
            warn!(
                target: "hearth",
                event = "staged_import_recovered",
                temp = %layout.import_temp_dir().display()
            );
            true
        }
        RecoveryAction::Clean => false,
        action => {
            debug!(
                target: "hearth",
                event = "staged_import_leftovers_cleaned",
                action = ?action
            );
            false
        }
    };

    if !staged.is_dir() {
        return Ok(if recovered {
            StepStatus::Applied
        } else {
            StepStatus::NotNeeded
        });
    }

    info!(
        target: "hearth",
        event = "staged_import_found",
        path = %staged.display()
    );
    promote_directory(&staged, active)?;
    info!(
        target: "hearth",
        event = "staged_import_activated",
        root = %active.display()
    );
    Ok(StepStatus::Applied)
}
