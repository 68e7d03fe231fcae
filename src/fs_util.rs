use std::fs::{self, File};
use std::io::{self, Write};
use std::path::Path;

use crate::paths::with_suffix;
use crate::{AppError, AppResult};

pub(crate) fn sync_dir(path: &Path) -> io::Result<()> {
    File::open(path)?.sync_all()
}

pub(crate) fn sync_parent(path: &Path) -> io::Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => sync_dir(parent),
        _ => Ok(()),
    }
}

/// Write `bytes` to `path` through a temp sibling, fsync, then rename into
/// place. Readers observe either the old contents or the new ones.
///
/// The parent directory must already exist; it is never created here.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> AppResult<()> {
    let tmp = with_suffix(path, ".tmp");
    let result = (|| -> AppResult<()> {
        let mut file =
            File::create(&tmp).map_err(|err| AppError::io(err, "write_atomic_create", &tmp))?;
        file.write_all(bytes)
            .map_err(|err| AppError::io(err, "write_atomic_write", &tmp))?;
        file.sync_all()
            .map_err(|err| AppError::io(err, "write_atomic_sync", &tmp))?;
        fs::rename(&tmp, path)
            .map_err(|err| AppError::io_move(err, "write_atomic_rename", &tmp, path))?;
        sync_parent(path).map_err(|err| AppError::io(err, "write_atomic_sync_dir", path))?;
        Ok(())
    })();

    if result.is_err() {
        let _ = fs::remove_file(&tmp);
    }
    result
}

/// Remove a directory tree if present. Missing paths are not an error.
pub(crate) fn remove_dir_if_exists(path: &Path, operation: &str) -> AppResult<bool> {
    match fs::remove_dir_all(path) {
        Ok(()) => Ok(true),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(err) => Err(AppError::io(err, operation, path)),
    }
}

/// Rename a file, replacing any existing file at `to`.
pub(crate) fn rename_replacing(from: &Path, to: &Path, operation: &str) -> AppResult<()> {
    fs::rename(from, to).map_err(|err| AppError::io_move(err, operation, from, to))
}
