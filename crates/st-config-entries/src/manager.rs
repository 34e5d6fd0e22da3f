//! Config entries manager
//!
//! Manages the lifecycle and persistence of configuration entries.

use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use st_core::AppId;

use crate::entry::{ConfigEntry, ConfigEntryState};
use crate::storage::{Storage, StorageFile, StorageResult};

/// Storage key for config entries
pub const STORAGE_KEY: &str = "smartthings.config_entries";
/// Current storage version
pub const STORAGE_VERSION: u32 = 1;

/// Config entries errors
#[derive(Debug, Error)]
pub enum ConfigEntriesError {
    #[error("Entry not found: {0}")]
    NotFound(String),

    #[error("Entry already exists with unique_id {0}")]
    AlreadyExists(String),

    #[error("Cannot unload entry in state {0:?}")]
    CannotUnload(ConfigEntryState),

    #[error("Storage error: {0}")]
    Storage(#[from] crate::storage::StorageError),
}

pub type ConfigEntriesResult<T> = Result<T, ConfigEntriesError>;

/// Config entries data for storage
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ConfigEntriesData {
    entries: Vec<ConfigEntry>,
}

/// Config entries manager
///
/// Holds all entries for the bridge, indexed by entry id and unique id, and
/// persists them to versioned JSON storage on every mutation.
pub struct ConfigEntries {
    storage: Arc<Storage>,

    /// Primary index: entry_id -> ConfigEntry
    entries: DashMap<String, ConfigEntry>,

    /// Index: unique_id -> entry_id
    by_unique_id: DashMap<String, String>,
}

impl ConfigEntries {
    /// Create a new config entries manager
    pub fn new(storage: Arc<Storage>) -> Self {
        Self {
            storage,
            entries: DashMap::new(),
            by_unique_id: DashMap::new(),
        }
    }

    /// Load entries from storage
    pub async fn load(&self) -> StorageResult<()> {
        if let Some(file) = self.storage.load::<ConfigEntriesData>(STORAGE_KEY).await? {
            info!(
                "Loading {} config entries from storage (v{})",
                file.data.entries.len(),
                file.version
            );
            for entry in file.data.entries {
                self.index_entry(entry);
            }
        }
        Ok(())
    }

    /// Save entries to storage
    pub async fn save(&self) -> StorageResult<()> {
        let data = ConfigEntriesData {
            entries: self.entries.iter().map(|r| r.value().clone()).collect(),
        };
        let file = StorageFile::new(STORAGE_KEY, data, STORAGE_VERSION);
        self.storage.save(&file).await?;
        debug!("Saved {} config entries to storage", self.entries.len());
        Ok(())
    }

    fn index_entry(&self, entry: ConfigEntry) {
        self.by_unique_id
            .insert(entry.unique_id.clone(), entry.entry_id.clone());
        self.entries.insert(entry.entry_id.clone(), entry);
    }

    /// Get an entry by ID
    pub fn get(&self, entry_id: &str) -> Option<ConfigEntry> {
        self.entries.get(entry_id).map(|r| r.value().clone())
    }

    /// Get an entry by its unique id
    pub fn get_by_unique_id(&self, unique_id: &str) -> Option<ConfigEntry> {
        self.by_unique_id
            .get(unique_id)
            .and_then(|id| self.get(&id))
    }

    /// Add a new config entry
    pub async fn add(&self, entry: ConfigEntry) -> ConfigEntriesResult<ConfigEntry> {
        if self.get_by_unique_id(&entry.unique_id).is_some() {
            return Err(ConfigEntriesError::AlreadyExists(entry.unique_id));
        }

        info!(
            "Added config entry: {} [{}]",
            entry.title, entry.entry_id
        );
        self.index_entry(entry.clone());
        self.save().await?;
        Ok(entry)
    }

    /// Rewrite the refresh token of an entry in place
    ///
    /// Called by the broker after every token regeneration; the old refresh
    /// token is invalidated by the exchange, so this must be persisted
    /// before the new one is relied upon.
    pub async fn update_refresh_token(
        &self,
        entry_id: &str,
        refresh_token: impl Into<String>,
    ) -> ConfigEntriesResult<()> {
        {
            let mut entry = self
                .entries
                .get_mut(entry_id)
                .ok_or_else(|| ConfigEntriesError::NotFound(entry_id.to_string()))?;
            entry.data.refresh_token = refresh_token.into();
            entry.modified_at = Utc::now();
        }
        self.save().await?;
        debug!(entry = entry_id, "Persisted rotated refresh token");
        Ok(())
    }

    /// Set entry state
    pub fn set_state(&self, entry_id: &str, state: ConfigEntryState, reason: Option<String>) {
        if let Some(mut entry) = self.entries.get_mut(entry_id) {
            entry.state = state;
            entry.reason = reason;
            debug!("Entry {} state changed to {:?}", entry_id, state);
        }
    }

    /// Remove an entry
    pub async fn remove(&self, entry_id: &str) -> ConfigEntriesResult<ConfigEntry> {
        let (_, entry) = self
            .entries
            .remove(entry_id)
            .ok_or_else(|| ConfigEntriesError::NotFound(entry_id.to_string()))?;
        self.by_unique_id.remove(&entry.unique_id);
        self.save().await?;

        info!("Removed config entry: {} [{}]", entry.title, entry_id);
        Ok(entry)
    }

    /// Count entries whose data references the given app id
    ///
    /// Used during removal: the parent app is only deleted once the last
    /// entry referencing it goes away.
    pub fn count_entries_for_app(&self, app_id: &AppId) -> usize {
        self.entries
            .iter()
            .filter(|r| &r.value().data.app_id == app_id)
            .count()
    }

    /// Get all entry IDs
    pub fn entry_ids(&self) -> Vec<String> {
        self.entries.iter().map(|r| r.key().clone()).collect()
    }

    /// Get count of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over all entries (cloned snapshots)
    pub fn iter(&self) -> impl Iterator<Item = ConfigEntry> + '_ {
        self.entries.iter().map(|r| r.value().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::SmartAppData;

    use tempfile::TempDir;

    fn app_data(app: &str, location: &str) -> SmartAppData {
        SmartAppData {
            access_token: "at".into(),
            client_id: "cid".into(),
            client_secret: "cs".into(),
            refresh_token: "rt-1".into(),
            installed_app_id: "ia-1".into(),
            app_id: app.into(),
            location_id: location.into(),
        }
    }

    fn create_test_manager() -> (TempDir, ConfigEntries) {
        let temp_dir = TempDir::new().unwrap();
        let storage = Arc::new(Storage::new(temp_dir.path()));
        let manager = ConfigEntries::new(storage);
        (temp_dir, manager)
    }

    #[tokio::test]
    async fn test_add_entry() {
        let (_dir, manager) = create_test_manager();

        let entry = ConfigEntry::new("Home", app_data("app-1", "loc-1"));
        let added = manager.add(entry).await.unwrap();

        assert_eq!(added.unique_id, "app-1_loc-1");
        assert_eq!(manager.len(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_unique_id_rejected() {
        let (_dir, manager) = create_test_manager();

        let entry1 = ConfigEntry::new("Home", app_data("app-1", "loc-1"));
        let entry2 = ConfigEntry::new("Home again", app_data("app-1", "loc-1"));

        manager.add(entry1).await.unwrap();
        let result = manager.add(entry2).await;

        assert!(matches!(result, Err(ConfigEntriesError::AlreadyExists(_))));
    }

    #[tokio::test]
    async fn test_refresh_token_rewrite_persists() {
        let temp_dir = TempDir::new().unwrap();
        let storage = Arc::new(Storage::new(temp_dir.path()));

        let entry_id = {
            let manager = ConfigEntries::new(storage.clone());
            let entry = manager
                .add(ConfigEntry::new("Home", app_data("app-1", "loc-1")))
                .await
                .unwrap();
            manager
                .update_refresh_token(&entry.entry_id, "rt-2")
                .await
                .unwrap();
            entry.entry_id
        };

        let manager = ConfigEntries::new(storage);
        manager.load().await.unwrap();
        let entry = manager.get(&entry_id).unwrap();
        assert_eq!(entry.data.refresh_token, "rt-2");
    }

    #[tokio::test]
    async fn test_remove_entry_and_app_counting() {
        let (_dir, manager) = create_test_manager();

        let e1 = manager
            .add(ConfigEntry::new("Home", app_data("app-1", "loc-1")))
            .await
            .unwrap();
        manager
            .add(ConfigEntry::new("Cabin", app_data("app-1", "loc-2")))
            .await
            .unwrap();

        assert_eq!(manager.count_entries_for_app(&"app-1".into()), 2);

        manager.remove(&e1.entry_id).await.unwrap();
        assert_eq!(manager.count_entries_for_app(&"app-1".into()), 1);
        assert!(manager.get(&e1.entry_id).is_none());
        assert!(manager.get_by_unique_id("app-1_loc-1").is_none());
    }

    #[tokio::test]
    async fn test_state_is_not_persisted() {
        let temp_dir = TempDir::new().unwrap();
        let storage = Arc::new(Storage::new(temp_dir.path()));

        let entry_id = {
            let manager = ConfigEntries::new(storage.clone());
            let entry = manager
                .add(ConfigEntry::new("Home", app_data("app-1", "loc-1")))
                .await
                .unwrap();
            manager.set_state(&entry.entry_id, ConfigEntryState::Loaded, None);
            manager.save().await.unwrap();
            entry.entry_id
        };

        let manager = ConfigEntries::new(storage);
        manager.load().await.unwrap();
        assert_eq!(
            manager.get(&entry_id).unwrap().state,
            ConfigEntryState::NotLoaded
        );
    }
}
