#![allow(clippy::unwrap_used, clippy::expect_used, dead_code)]

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use semver::Version;
use serde_json::Value;
use walkdir::WalkDir;

use hearth_migrate::{
    AppError, AppRepositorySync, AppResult, ConfigStore, DeviceCategory, DeviceClassifier,
    ExternalInstalls, MemoryStore, MigrationConfig, MigrationPipeline, ServerControl, Services,
    UserAccounts,
};

/// Ordered record of every collaborator call, shared by all fakes.
#[derive(Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<String>>>);

impl CallLog {
    pub fn push(&self, call: impl Into<String>) {
        self.0.lock().unwrap().push(call.into());
    }

    pub fn calls(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    pub fn contains(&self, call: &str) -> bool {
        self.calls().iter().any(|c| c == call)
    }

    pub fn position(&self, call: &str) -> Option<usize> {
        self.calls().iter().position(|c| c == call)
    }
}

fn injected(call: &str) -> AppError {
    AppError::new("TEST/INJECTED", format!("injected failure in {call}"))
}

/// Names of calls that should fail when reached.
#[derive(Clone, Default)]
pub struct Failures(Arc<Mutex<HashSet<String>>>);

impl Failures {
    pub fn add(&self, call: &str) {
        self.0.lock().unwrap().insert(call.to_string());
    }

    pub fn clear(&self) {
        self.0.lock().unwrap().clear();
    }

    fn check(&self, call: &str) -> AppResult<()> {
        if self.0.lock().unwrap().contains(call) {
            Err(injected(call))
        } else {
            Ok(())
        }
    }
}

pub struct FakeDevice {
    pub category: DeviceCategory,
    log: CallLog,
}

#[async_trait]
impl DeviceClassifier for FakeDevice {
    async fn detect(&self) -> AppResult<DeviceCategory> {
        self.log.push("device.detect");
        Ok(self.category)
    }
}

#[derive(Default)]
pub struct UserState {
    pub exists: bool,
    pub name: Option<String>,
    pub password_hash: Option<String>,
    pub otp_uri: Option<String>,
}

pub struct FakeUsers {
    pub state: Mutex<UserState>,
    log: CallLog,
    failures: Failures,
}

#[async_trait]
impl UserAccounts for FakeUsers {
    async fn exists(&self) -> AppResult<bool> {
        self.log.push("users.exists");
        Ok(self.state.lock().unwrap().exists)
    }

    async fn set_name(&self, name: &str) -> AppResult<()> {
        self.log.push("users.set_name");
        self.failures.check("users.set_name")?;
        self.state.lock().unwrap().name = Some(name.to_string());
        Ok(())
    }

    async fn set_hashed_password(&self, hash: &str) -> AppResult<()> {
        self.log.push("users.set_hashed_password");
        self.failures.check("users.set_hashed_password")?;
        self.state.lock().unwrap().password_hash = Some(hash.to_string());
        Ok(())
    }

    async fn enable_two_factor(&self, otp_uri: &str) -> AppResult<()> {
        self.log.push("users.enable_two_factor");
        self.failures.check("users.enable_two_factor")?;
        self.state.lock().unwrap().otp_uri = Some(otp_uri.to_string());
        Ok(())
    }
}

/// Memory-backed store that records writes and can refuse chosen keys.
pub struct RecordingStore {
    pub inner: MemoryStore,
    pub writes: Mutex<Vec<(String, Value)>>,
    log: CallLog,
    failures: Failures,
}

impl RecordingStore {
    pub fn value(&self, key: &str) -> Option<Value> {
        self.inner.snapshot().get(key).cloned()
    }

    pub fn writes_for(&self, key: &str) -> Vec<Value> {
        self.writes
            .lock()
            .unwrap()
            .iter()
            .filter(|(k, _)| k == key)
            .map(|(_, v)| v.clone())
            .collect()
    }
}

#[async_trait]
impl ConfigStore for RecordingStore {
    async fn get(&self, key: &str) -> AppResult<Option<Value>> {
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: Value) -> AppResult<()> {
        let call = format!("store.set:{key}");
        self.log.push(call.clone());
        self.failures.check(&call)?;
        self.writes
            .lock()
            .unwrap()
            .push((key.to_string(), value.clone()));
        self.inner.set(key, value).await
    }
}

pub struct FakeRepoSync {
    log: CallLog,
    failures: Failures,
}

#[async_trait]
impl AppRepositorySync for FakeRepoSync {
    async fn update(&self) -> AppResult<()> {
        self.log.push("repos.update");
        self.failures.check("repos.update")
    }
}

pub struct FakeExternalInstalls {
    pub found: Mutex<Option<PathBuf>>,
    log: CallLog,
    failures: Failures,
}

#[async_trait]
impl ExternalInstalls for FakeExternalInstalls {
    async fn find(&self) -> AppResult<Option<PathBuf>> {
        self.log.push("external.find");
        self.failures.check("external.find")?;
        Ok(self.found.lock().unwrap().clone())
    }

    async fn run_pre_migration_checks(&self, _current: &Path, _external: &Path) -> AppResult<()> {
        self.log.push("external.pre_checks");
        self.failures.check("external.pre_checks")
    }

    async fn migrate_data(&self, _current: &Path, _external: &Path) -> AppResult<()> {
        self.log.push("external.migrate_data");
        self.failures.check("external.migrate_data")
    }
}

pub struct FakeServer {
    log: CallLog,
}

#[async_trait]
impl ServerControl for FakeServer {
    async fn start(&self) -> AppResult<()> {
        self.log.push("server.start");
        Ok(())
    }
}

/// A full set of recording fakes wired into `Services`.
pub struct Harness {
    pub log: CallLog,
    pub failures: Failures,
    pub device: Arc<FakeDevice>,
    pub users: Arc<FakeUsers>,
    pub store: Arc<RecordingStore>,
    pub repos: Arc<FakeRepoSync>,
    pub external: Arc<FakeExternalInstalls>,
    pub server: Arc<FakeServer>,
}

impl Harness {
    pub fn new(category: DeviceCategory) -> Self {
        let log = CallLog::default();
        let failures = Failures::default();
        Self {
            device: Arc::new(FakeDevice {
                category,
                log: log.clone(),
            }),
            users: Arc::new(FakeUsers {
                state: Mutex::new(UserState::default()),
                log: log.clone(),
                failures: failures.clone(),
            }),
            store: Arc::new(RecordingStore {
                inner: MemoryStore::new(),
                writes: Mutex::new(Vec::new()),
                log: log.clone(),
                failures: failures.clone(),
            }),
            repos: Arc::new(FakeRepoSync {
                log: log.clone(),
                failures: failures.clone(),
            }),
            external: Arc::new(FakeExternalInstalls {
                found: Mutex::new(None),
                log: log.clone(),
                failures: failures.clone(),
            }),
            server: Arc::new(FakeServer { log: log.clone() }),
            log,
            failures,
        }
    }

    pub fn with_existing_user(self) -> Self {
        self.users.state.lock().unwrap().exists = true;
        self
    }

    pub fn with_external_install(self, path: impl Into<PathBuf>) -> Self {
        *self.external.found.lock().unwrap() = Some(path.into());
        self
    }

    pub fn services(&self) -> Services {
        Services {
            device: self.device.clone(),
            users: self.users.clone(),
            store: self.store.clone(),
            app_repositories: self.repos.clone(),
            external_installs: self.external.clone(),
            server: self.server.clone(),
        }
    }

    pub fn pipeline(&self, root: &Path) -> MigrationPipeline {
        MigrationPipeline::new(
            MigrationConfig::new(root, Version::new(1, 2, 0)),
            self.services(),
        )
    }

    /// True when any call past the device/user gate reached the importer.
    pub fn import_attempted(&self) -> bool {
        self.log.calls().iter().any(|call| {
            call.starts_with("external.") || call == "server.start"
        })
    }
}

/// Every file and directory under `root`, relative, with file contents.
pub fn snapshot_tree(root: &Path) -> BTreeMap<PathBuf, Option<Vec<u8>>> {
    WalkDir::new(root)
        .min_depth(1)
        .sort_by_file_name()
        .into_iter()
        .map(|entry| {
            let entry = entry.expect("walk entry");
            let relative = entry
                .path()
                .strip_prefix(root)
                .expect("entry under root")
                .to_path_buf();
            let contents = entry
                .file_type()
                .is_file()
                .then(|| std::fs::read(entry.path()).expect("read file"));
            (relative, contents)
        })
        .collect()
}

pub fn write_file(path: &Path, contents: &[u8]) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("create parent");
    }
    std::fs::write(path, contents).expect("write file");
}
