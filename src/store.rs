use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::fs_util::write_atomic;
use crate::{AppError, AppResult};

pub const VERSION_KEY: &str = "version";
pub const APP_REPOSITORIES_KEY: &str = "appRepositories";
pub const APPS_KEY: &str = "apps";
pub const TOR_ENABLED_KEY: &str = "torEnabled";
pub const WIDGETS_KEY: &str = "widgets";

/// Persisted key/value configuration shared by every platform subsystem.
#[async_trait]
pub trait ConfigStore: Send + Sync {
    async fn get(&self, key: &str) -> AppResult<Option<Value>>;
    async fn set(&self, key: &str, value: Value) -> AppResult<()>;
}

#[derive(Default)]
pub struct MemoryStore {
    data: Mutex<BTreeMap<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> BTreeMap<String, Value> {
        self.data
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl ConfigStore for MemoryStore {
    async fn get(&self, key: &str) -> AppResult<Option<Value>> {
        Ok(self
            .data
            .lock()
            .map(|guard| guard.get(key).cloned())
            .unwrap_or_default())
    }

    async fn set(&self, key: &str, value: Value) -> AppResult<()> {
        let mut guard = self.data.lock().unwrap_or_else(|err| err.into_inner());
        guard.insert(key.to_string(), value);
        Ok(())
    }
}

/// A JSON object on disk. Every `set` is a read-modify-write through
/// [`write_atomic`], so the file is never observed half-written and changes
/// made by other writers between calls are not lost.
pub struct JsonFileStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> AppResult<Map<String, Value>> {
        let raw = match std::fs::read(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Map::new()),
            Err(err) => {
                return Err(AppError::new("STORE/READ", "Failed to read configuration store")
                    .with_context("path", self.path.display().to_string())
                    .with_cause(err))
            }
        };
        if raw.iter().all(u8::is_ascii_whitespace) {
            return Ok(Map::new());
        }
        match serde_json::from_slice::<Value>(&raw) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(_) => Err(AppError::new(
                "STORE/CORRUPT",
                "Configuration store is not a JSON object",
            )
            .with_context("path", self.path.display().to_string())),
            Err(err) => Err(AppError::new(
                "STORE/CORRUPT",
                "Configuration store is not valid JSON",
            )
            .with_context("path", self.path.display().to_string())
            .with_cause(err)),
        }
    }
}

#[async_trait]
impl ConfigStore for JsonFileStore {
    async fn get(&self, key: &str) -> AppResult<Option<Value>> {
        let _guard = self.lock.lock().unwrap_or_else(|err| err.into_inner());
        Ok(self.load()?.get(key).cloned())
    }

    async fn set(&self, key: &str, value: Value) -> AppResult<()> {
        let _guard = self.lock.lock().unwrap_or_else(|err| err.into_inner());
        let mut map = self.load()?;
        map.insert(key.to_string(), value);
        let bytes = serde_json::to_vec_pretty(&Value::Object(map))?;
        write_atomic(&self.path, &bytes).map_err(|err| {
            AppError::new("STORE/WRITE", "Failed to persist configuration store")
                .with_context("key", key)
                .with_context("path", self.path.display().to_string())
                .with_cause(err)
        })
    }
}
