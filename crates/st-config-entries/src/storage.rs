//! Storage abstraction for JSON persistence
//!
//! Versioned JSON files under a `.storage/` directory.

use std::path::{Path, PathBuf};

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;
use tokio::fs;
use tracing::debug;

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Storage file wrapper with version tracking
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageFile<T> {
    /// Major version - breaking changes
    pub version: u32,
    /// Storage key (file identifier)
    pub key: String,
    /// The actual data
    pub data: T,
}

impl<T> StorageFile<T> {
    pub fn new(key: impl Into<String>, data: T, version: u32) -> Self {
        Self {
            version,
            key: key.into(),
            data,
        }
    }
}

/// JSON file storage rooted at a configuration directory
#[derive(Debug, Clone)]
pub struct Storage {
    dir: PathBuf,
}

impl Storage {
    pub fn new(config_dir: impl AsRef<Path>) -> Self {
        Self {
            dir: config_dir.as_ref().join(".storage"),
        }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(key)
    }

    /// Load a storage file by key; `None` if it does not exist yet
    pub async fn load<T: DeserializeOwned>(&self, key: &str) -> StorageResult<Option<StorageFile<T>>> {
        let path = self.path_for(key);
        match fs::read(&path).await {
            Ok(bytes) => {
                let file = serde_json::from_slice(&bytes)?;
                Ok(Some(file))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Save a storage file, creating the `.storage/` directory if needed
    pub async fn save<T: Serialize>(&self, file: &StorageFile<T>) -> StorageResult<()> {
        fs::create_dir_all(&self.dir).await?;
        let path = self.path_for(&file.key);
        let json = serde_json::to_vec_pretty(file)?;
        fs::write(&path, json).await?;
        debug!(key = %file.key, "Saved storage file");
        Ok(())
    }
}
