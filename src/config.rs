//! Runtime configuration read from `timetable.toml` plus environment overrides.

use crate::calendar::DEFAULT_SEMESTER_NAME;
use crate::persistence::StoreBackend;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DEFAULT_CONFIG_FILE: &str = "timetable.toml";
pub const ENV_BACKEND: &str = "TIMETABLE_BACKEND";
pub const ENV_DATA_DIR: &str = "TIMETABLE_DATA_DIR";
pub const ENV_SEMESTER: &str = "TIMETABLE_SEMESTER";
pub const ENV_HTTP_ADDR: &str = "TIMETABLE_HTTP_ADDR";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid value for {key}: {message}")]
    Invalid { key: &'static str, message: String },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimetableConfig {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub semester: SemesterConfig,
    #[serde(default)]
    pub http: HttpConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StoreBackend,
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            data_dir: default_data_dir(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SemesterConfig {
    /// Name of the semester that is active on startup.
    #[serde(default = "default_semester")]
    pub current: String,
}

impl Default for SemesterConfig {
    fn default() -> Self {
        Self {
            current: default_semester(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_http_addr")]
    pub addr: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            addr: default_http_addr(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./timetable-data")
}

fn default_semester() -> String {
    DEFAULT_SEMESTER_NAME.to_string()
}

fn default_http_addr() -> String {
    "0.0.0.0:3000".to_string()
}

impl TimetableConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path.as_ref()).map_err(|source| ConfigError::Read {
            path: path.as_ref().to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// `timetable.toml` in the working directory, or defaults when absent.
    pub fn from_default_location() -> Result<Self, ConfigError> {
        let path = PathBuf::from(DEFAULT_CONFIG_FILE);
        if path.exists() {
            Self::from_file(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Explicit path when given, default location otherwise, then process env.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::from_default_location()?,
        };
        config.apply_env_with(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Applies `TIMETABLE_*` overrides read through `lookup`.
    pub fn apply_env_with<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(backend) = lookup(ENV_BACKEND) {
            self.storage.backend = backend.parse().map_err(|message| ConfigError::Invalid {
                key: ENV_BACKEND,
                message,
            })?;
        }
        if let Some(dir) = lookup(ENV_DATA_DIR).filter(|v| !v.trim().is_empty()) {
            self.storage.data_dir = PathBuf::from(dir);
        }
        if let Some(semester) = lookup(ENV_SEMESTER).filter(|v| !v.trim().is_empty()) {
            self.semester.current = semester;
        }
        if let Some(addr) = lookup(ENV_HTTP_ADDR).filter(|v| !v.trim().is_empty()) {
            self.http.addr = addr;
        }
        Ok(())
    }
}
