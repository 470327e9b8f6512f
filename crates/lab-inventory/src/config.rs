//! Runtime configuration.
//!
//! Resolution order, lowest to highest precedence: built-in defaults, then
//! `{data_dir}/config.json`, then environment variables, then an explicit
//! data directory passed by the caller (CLI flag).

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{InventoryError, Result};

pub const ENV_DATA_DIR: &str = "LAB_INVENTORY_DIR";
pub const ENV_TOKEN_TTL: &str = "LAB_INVENTORY_TOKEN_TTL";

const CONFIG_FILE: &str = "config.json";
const DEFAULT_DIR_NAME: &str = ".lab-inventory";
const DEFAULT_TOKEN_TTL_SECS: u64 = 24 * 60 * 60;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    pub data_dir: PathBuf,
    pub token_ttl_secs: u64,
}

/// Keys accepted in `config.json`. The data directory itself is not one of
/// them since the file lives inside it.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    token_ttl_secs: Option<u64>,
}

impl Config {
    /// Resolve configuration from the process environment.
    pub fn load(data_dir: Option<PathBuf>) -> Result<Self> {
        Self::load_with(data_dir, |key| std::env::var(key).ok())
    }

    /// Resolve configuration with a custom environment lookup.
    pub fn load_with<F>(data_dir: Option<PathBuf>, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let data_dir = data_dir
            .or_else(|| env(ENV_DATA_DIR).filter(|v| !v.is_empty()).map(PathBuf::from))
            .unwrap_or_else(|| default_data_dir(env("HOME")));

        let file = read_config_file(&data_dir.join(CONFIG_FILE))?;
        let mut token_ttl_secs = file.token_ttl_secs.unwrap_or(DEFAULT_TOKEN_TTL_SECS);
        if let Some(raw) = env(ENV_TOKEN_TTL) {
            token_ttl_secs = raw.trim().parse().map_err(|_| {
                InventoryError::InvalidInput(format!("{ENV_TOKEN_TTL} must be a number of seconds"))
            })?;
        }
        if token_ttl_secs == 0 {
            return Err(InventoryError::InvalidInput(
                "token TTL must be at least one second".into(),
            ));
        }

        Ok(Self {
            data_dir,
            token_ttl_secs,
        })
    }

    pub fn token_ttl(&self) -> Duration {
        Duration::from_secs(self.token_ttl_secs)
    }

    /// Project and hardware set documents.
    pub fn inventory_dir(&self) -> PathBuf {
        self.data_dir.join("inventory")
    }

    /// Credential records.
    pub fn users_dir(&self) -> PathBuf {
        self.data_dir.join("users")
    }

    pub fn issuer_key_path(&self) -> PathBuf {
        self.data_dir.join("issuer.key")
    }
}

fn default_data_dir(home: Option<String>) -> PathBuf {
    match home {
        Some(home) if !home.is_empty() => PathBuf::from(home).join(DEFAULT_DIR_NAME),
        _ => PathBuf::from(DEFAULT_DIR_NAME),
    }
}

fn read_config_file(path: &Path) -> Result<ConfigFile> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(ConfigFile::default()),
        Err(e) => return Err(e.into()),
    };
    serde_json::from_slice(&bytes).map_err(|e| {
        InventoryError::InvalidFileFormat(format!("failed to parse {}: {e}", path.display()))
    })
}
