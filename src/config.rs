use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::app_dirs::{AppDirs, APP_NAME, DB_FILE};
use crate::store::{JsonFileStorage, MemoryStorage, SqliteStorage, StorageError, StorageGateway};

/// Where attempts are persisted
#[derive(
    Debug,
    Copy,
    Clone,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    ValueEnum,
    strum_macros::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Sqlite,
    Json,
    Memory,
}

impl StorageBackend {
    /// Opens the gateway under `data_dir`, or the default state directory.
    pub fn open(&self, data_dir: Option<&Path>) -> Result<Box<dyn StorageGateway>, StorageError> {
        let dir = data_dir
            .map(Path::to_path_buf)
            .or_else(AppDirs::state_dir)
            .unwrap_or_else(|| PathBuf::from(APP_NAME));

        Ok(match self {
            StorageBackend::Sqlite => Box::new(SqliteStorage::open(dir.join(DB_FILE))?),
            StorageBackend::Json => Box::new(JsonFileStorage::new(dir)),
            StorageBackend::Memory => Box::new(MemoryStorage::new()),
        })
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Question bank file; the bundled bank when unset
    pub bank_path: Option<PathBuf>,
    pub storage: StorageBackend,
    pub data_dir: Option<PathBuf>,
    /// Test started most recently, preselected in the picker
    pub last_test: Option<u32>,
}

pub trait ConfigStore {
    fn load(&self) -> Config;
    fn save(&self, cfg: &Config) -> std::io::Result<()>;
}

#[derive(Debug, Clone)]
pub struct FileConfigStore {
    path: PathBuf,
}

impl FileConfigStore {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        let path = AppDirs::config_path().unwrap_or_else(|| PathBuf::from("examr_config.json"));
        Self { path }
    }

    pub fn with_path<P: AsRef<Path>>(p: P) -> Self {
        Self {
            path: p.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Default for FileConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigStore for FileConfigStore {
    fn load(&self) -> Config {
        if let Ok(bytes) = fs::read(&self.path) {
            match serde_json::from_slice::<Config>(&bytes) {
                Ok(cfg) => return cfg,
                Err(e) => log::warn!("ignoring malformed config {}: {}", self.path.display(), e),
            }
        }
        Config::default()
    }

    fn save(&self, cfg: &Config) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_vec_pretty(cfg).unwrap_or_default();
        fs::write(&self.path, data)
    }
}

/// Config store that keeps everything in memory; used when nothing should touch disk
#[derive(Debug, Default)]
pub struct MemoryConfigStore {
    cfg: std::cell::RefCell<Config>,
}

impl MemoryConfigStore {
    pub fn new(cfg: Config) -> Self {
        Self {
            cfg: std::cell::RefCell::new(cfg),
        }
    }
}

impl ConfigStore for MemoryConfigStore {
    fn load(&self) -> Config {
        self.cfg.borrow().clone()
    }

    fn save(&self, cfg: &Config) -> std::io::Result<()> {
        *self.cfg.borrow_mut() = cfg.clone();
        Ok(())
    }
}
