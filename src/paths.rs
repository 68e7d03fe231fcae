use std::path::{Path, PathBuf};

pub const IMPORT_DIR: &str = "import";
pub const IMPORT_TEMP_SUFFIX: &str = "-import-temp";
pub const IMPORT_ARCHIVE_SUFFIX: &str = "-import-old";
pub const TOMBSTONE_SUFFIX: &str = ".migrated";

/// Append `suffix` to the final component of `base` without touching its
/// parent, e.g. `/home/data` + `-import-temp` -> `/home/data-import-temp`.
///
/// `/home/data/` yields the same sibling; the suffix never lands inside
/// `base`.
pub fn with_suffix(base: &Path, suffix: &str) -> PathBuf {
    let mut os = normalize(base).into_os_string();
    os.push(suffix);
    PathBuf::from(os)
}

/// Drop trailing separators and `.` components so the final component is a
/// real name.
pub fn normalize(path: &Path) -> PathBuf {
    path.components().collect()
}

/// Every path the migration pipeline reads or writes, derived from the
/// active data root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataLayout {
    root: PathBuf,
}

impl DataLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: normalize(&root.into()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory an external import process fills with a full replacement
    /// of the root.
    pub fn import_dir(&self) -> PathBuf {
        self.root.join(IMPORT_DIR)
    }

    /// Sibling of the root used while a staged import is being promoted.
    pub fn import_temp_dir(&self) -> PathBuf {
        with_suffix(&self.root, IMPORT_TEMP_SUFFIX)
    }

    /// Sibling holding the previous root between the two promotion renames.
    pub fn import_archive_dir(&self) -> PathBuf {
        with_suffix(&self.root, IMPORT_ARCHIVE_SUFFIX)
    }

    /// Default location of the JSON configuration store.
    pub fn store_file(&self) -> PathBuf {
        self.root.join("hearth.json")
    }

    pub fn legacy_user_file(&self) -> PathBuf {
        self.root.join("db").join("user.json")
    }

    pub fn legacy_user_tombstone(&self) -> PathBuf {
        tombstone_for(&self.legacy_user_file())
    }

    pub fn env_file(&self) -> PathBuf {
        self.root.join(".env")
    }

    pub fn env_tombstone(&self) -> PathBuf {
        tombstone_for(&self.env_file())
    }
}

pub fn tombstone_for(path: &Path) -> PathBuf {
    with_suffix(path, TOMBSTONE_SUFFIX)
}
