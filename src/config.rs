use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::logging::default_log_level;

const APP_DIR: &str = "pme";
const STORE_FILE: &str = "store.json";
const LOG_DIR: &str = "logs";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to create data directory '{path}': {source}")]
    CreateDirFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Runtime settings. Flags win over `PME_*` environment variables (both are
/// handled by clap); anything left unset falls back to the per-user data
/// directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub store_path: PathBuf,
    pub log_dir: PathBuf,
    pub log_level: String,
}

impl Config {
    pub fn resolve(
        store_path: Option<PathBuf>,
        log_dir: Option<PathBuf>,
        log_level: Option<String>,
    ) -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR);
        Self::resolve_in(&data_dir, store_path, log_dir, log_level)
    }

    fn resolve_in(
        data_dir: &Path,
        store_path: Option<PathBuf>,
        log_dir: Option<PathBuf>,
        log_level: Option<String>,
    ) -> Self {
        Self {
            store_path: store_path.unwrap_or_else(|| data_dir.join(STORE_FILE)),
            log_dir: log_dir.unwrap_or_else(|| data_dir.join(LOG_DIR)),
            log_level: log_level.unwrap_or_else(|| default_log_level().to_string()),
        }
    }

    /// Creates the directory holding the store file
    pub fn ensure_store_dir(&self) -> Result<(), ConfigError> {
        let Some(parent) = self
            .store_path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
        else {
            return Ok(());
        };
        std::fs::create_dir_all(parent).map_err(|source| ConfigError::CreateDirFailed {
            path: parent.to_path_buf(),
            source,
        })
    }
}
