use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::db;
use crate::storage::UploadLimits;

pub const SETTINGS_VERSION: &str = "1.0";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_version")]
    pub version: String,
    pub storage_root: PathBuf,
    /// Defaults to `{storage_root}/csvpipe.db`.
    #[serde(default)]
    pub database_path: Option<PathBuf>,
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    #[serde(default)]
    pub upload: UploadLimits,
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Target names offered to clients for column mappings.
    #[serde(default)]
    pub mapping_targets: Vec<String>,
}

fn default_version() -> String {
    SETTINGS_VERSION.to_string()
}

fn default_worker_count() -> usize {
    num_cpus::get()
}

fn default_queue_capacity() -> usize {
    256
}

/// Platform data directory for csvpipe, e.g. `~/.local/share/csvpipe`.
pub fn default_storage_root() -> PathBuf {
    dirs::data_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(std::env::temp_dir)
        .join("csvpipe")
}

impl Settings {
    pub fn new<P: AsRef<Path>>(storage_root: P) -> Self {
        Self {
            version: default_version(),
            storage_root: storage_root.as_ref().to_path_buf(),
            database_path: None,
            worker_count: default_worker_count(),
            queue_capacity: default_queue_capacity(),
            upload: UploadLimits::default(),
            logging: LoggingConfig::default(),
            mapping_targets: Vec::new(),
        }
    }

    pub fn database_path(&self) -> PathBuf {
        self.database_path
            .clone()
            .unwrap_or_else(|| db::database_path_in(&self.storage_root))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}
