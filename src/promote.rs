//! Directory promotion by atomic renames.
//!
//! A directory cannot be renamed onto an ancestor of itself, so a staged
//! replacement that lives inside the active directory is promoted in two
//! phases:
//!
//! 1. the staged directory is renamed to a temp sibling of the active
//!    directory (`<active>-import-temp`);
//! 2. the active directory is renamed aside to `<active>-import-old`, the
//!    temp sibling is renamed onto the active path, and the old tree is
//!    removed.
//!
//! Each rename is atomic on its own. The sequence as a whole is not: a crash
//! between phases leaves only the temp sibling behind.
//! [`recover_interrupted_promotion`] treats that sibling as the source of
//! truth and finishes phase 2 on the next start.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::fs_util::{remove_dir_if_exists, sync_dir};
use crate::paths::{normalize, with_suffix, IMPORT_ARCHIVE_SUFFIX, IMPORT_TEMP_SUFFIX};
use crate::{AppError, AppResult};

/// What [`recover_interrupted_promotion`] found and did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryAction {
    /// No leftovers from an earlier promotion.
    Clean,
    /// A temp sibling was found and promoted onto the active path.
    CompletedPromotion,
    /// The old tree from a finished promotion was still on disk and was removed.
    RemovedArchive,
    /// The active path was missing and the archived tree was put back.
    RestoredArchive,
}

fn parent_of(active: &Path) -> AppResult<PathBuf> {
    match active.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => Ok(parent.to_path_buf()),
        _ => Err(AppError::new(
            "PROMOTE/NO_PARENT",
            "Active directory path does not have a parent directory",
        )
        .with_context("path", active.display().to_string())),
    }
}

pub fn temp_path_for(active: &Path) -> PathBuf {
    with_suffix(active, IMPORT_TEMP_SUFFIX)
}

pub fn archive_path_for(active: &Path) -> PathBuf {
    with_suffix(active, IMPORT_ARCHIVE_SUFFIX)
}

/// Replace `active` with the directory at `staged`.
///
/// `staged` may live inside `active`. Both phases use `rename`, never a
/// recursive copy, so `staged`, `active` and the temp sibling must be on one
/// filesystem. The previous contents of `active` are discarded once the
/// promotion completes. A stale temp sibling from an earlier attempt is
/// overwritten.
///
/// Not atomic across phases. Safe to retry only together with
/// [`recover_interrupted_promotion`].
pub fn promote_directory(staged: &Path, active: &Path) -> AppResult<()> {
    if !staged.is_dir() {
        return Err(AppError::new(
            "PROMOTE/STAGED_MISSING",
            "Staged directory does not exist",
        )
        .with_context("path", staged.display().to_string()));
    }
    let active = &normalize(active);
    let parent = parent_of(active)?;
    let temp = temp_path_for(active);

    if remove_dir_if_exists(&temp, "promote_remove_stale_temp")? {
        warn!(
            target: "hearth",
            event = "promote_stale_temp_removed",
            path = %temp.display()
        );
    }

    fs::rename(staged, &temp)
        .map_err(|err| AppError::io_move(err, "promote_stage_to_temp", staged, &temp))?;
    sync_dir(&parent).map_err(|err| AppError::io(err, "promote_sync_parent", &parent))?;
    info!(
        target: "hearth",
        event = "promote_staged_moved",
        from = %staged.display(),
        to = %temp.display()
    );

    complete_promotion(&temp, active)
}

/// Phase 2: move `active` aside, rename `temp` onto it, drop the old tree.
fn complete_promotion(temp: &Path, active: &Path) -> AppResult<()> {
    let parent = parent_of(active)?;
    let archive = archive_path_for(active);

    remove_dir_if_exists(&archive, "promote_remove_stale_archive")?;

    let archived = if active.exists() {
        fs::rename(active, &archive)
            .map_err(|err| AppError::io_move(err, "promote_archive_active", active, &archive))?;
        true
    } else {
        false
    };

    if let Err(err) = fs::rename(temp, active) {
        if archived {
            roll_back(&archive, active);
        }
        return Err(AppError::io_move(err, "promote_temp_to_active", temp, active));
    }
    sync_dir(&parent).map_err(|err| AppError::io(err, "promote_sync_parent", &parent))?;

    if archived {
        // The promotion is already durable; a leftover archive is cleaned up
        // by the next recovery pass.
        if let Err(err) = remove_dir_if_exists(&archive, "promote_remove_archive") {
            warn!(
                target: "hearth",
                event = "promote_archive_cleanup_failed",
                path = %archive.display(),
                error = %err
            );
        }
    }

    info!(
        target: "hearth",
        event = "promote_completed",
        active = %active.display()
    );
    Ok(())
}

/// Put the archived tree back after a failed promote rename. Returns whether
/// `active` was restored; on failure the archive is left for recovery.
fn roll_back(archive: &Path, active: &Path) -> bool {
    match fs::rename(archive, active) {
        Ok(()) => true,
        Err(err) => {
            warn!(
                target: "hearth",
                event = "promote_rollback_failed",
                archive = %archive.display(),
                active = %active.display(),
                error = %err
            );
            false
        }
    }
}

/// Finish or clean up a promotion that a previous process did not complete.
///
/// Must run before looking for a new staged directory. When `staged` exists a
/// fresh promotion supersedes whatever was left behind, so a temp sibling is
/// left for [`promote_directory`] to overwrite.
pub fn recover_interrupted_promotion(staged: &Path, active: &Path) -> AppResult<RecoveryAction> {
    let active = &normalize(active);
    let temp = temp_path_for(active);
    let archive = archive_path_for(active);

    if temp.is_dir() && !staged.exists() {
        warn!(
            target: "hearth",
            event = "promote_recovery_started",
            temp = %temp.display(),
            active = %active.display()
        );
        complete_promotion(&temp, active)?;
        return Ok(RecoveryAction::CompletedPromotion);
    }

    if archive.exists() {
        if active.exists() {
            remove_dir_if_exists(&archive, "promote_recovery_remove_archive")?;
            info!(
                target: "hearth",
                event = "promote_recovery_archive_removed",
                path = %archive.display()
            );
            return Ok(RecoveryAction::RemovedArchive);
        }
        fs::rename(&archive, active).map_err(|err| {
            AppError::io_move(err, "promote_recovery_restore_archive", &archive, active)
        })?;
        warn!(
            target: "hearth",
            event = "promote_recovery_archive_restored",
            active = %active.display()
        );
        return Ok(RecoveryAction::RestoredArchive);
    }

    Ok(RecoveryAction::Clean)
}
