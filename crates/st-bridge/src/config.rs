//! Daemon configuration
//!
//! Loaded from a YAML file: where to listen, where to keep storage, and
//! optionally one seed entry so a fresh install can start without a
//! pre-populated storage directory.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use st_config_entries::SmartAppData;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid configuration: {0}")]
    Parse(#[from] serde_yaml::Error),
}

fn default_listen_addr() -> SocketAddr {
    ([0, 0, 0, 0], 8123).into()
}

fn default_config_dir() -> PathBuf {
    PathBuf::from(".")
}

/// A config entry seeded from the configuration file
#[derive(Debug, Clone, Deserialize)]
pub struct SeedEntry {
    pub title: String,
    #[serde(flatten)]
    pub data: SmartAppData,
}

/// Top-level daemon configuration
#[derive(Debug, Clone, Deserialize)]
pub struct BridgeConfig {
    /// Address the webhook endpoint listens on
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,

    /// Directory holding the `.storage/` tree
    #[serde(default = "default_config_dir")]
    pub config_dir: PathBuf,

    /// Override of the cloud REST base URL (testing against a mock)
    #[serde(default)]
    pub api_base_url: Option<String>,

    /// Entry created on first start when no entry with the same unique id
    /// exists yet
    #[serde(default)]
    pub entry: Option<SeedEntry>,
}

impl BridgeConfig {
    /// Load configuration from a YAML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(serde_yaml::from_str(&raw)?)
    }
}
