//! Entry lifecycle
//!
//! Setup discovers the installation's rooms, scenes, and devices, rotates
//! the refresh token, constructs and connects the broker, and populates the
//! entity registry. Authorization failures remove the entry so a fresh
//! authorization can be performed; every other failure leaves the entry in
//! setup-retry.

use std::sync::Arc;

use dashmap::DashMap;
use futures::future::join_all;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use st_api::{ApiError, SmartThings};
use st_broker::{DeviceBroker, SmartAppManager};
use st_config_entries::{ConfigEntries, ConfigEntriesError, ConfigEntry, ConfigEntryState};
use st_platforms::entity::DeviceCommands;

use crate::registry::{spawn_listeners, EntityRegistry};

/// Bridge-level lifecycle errors
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("entry not found: {0}")]
    NotFound(String),

    #[error("authorization rejected; the entry was removed and must be reconfigured")]
    AuthRevoked,

    #[error("setup not ready: {0}")]
    NotReady(String),

    #[error(transparent)]
    Entries(#[from] ConfigEntriesError),
}

/// Everything a loaded entry owns; released on unload
struct LoadedEntry {
    broker: Arc<DeviceBroker>,
    registry: Arc<EntityRegistry>,
    listeners: Vec<JoinHandle<()>>,
}

enum SetupFailure {
    Api(ApiError),
    NotAuthorized,
    Entries(ConfigEntriesError),
}

impl From<ApiError> for SetupFailure {
    fn from(err: ApiError) -> Self {
        SetupFailure::Api(err)
    }
}

impl From<ConfigEntriesError> for SetupFailure {
    fn from(err: ConfigEntriesError) -> Self {
        SetupFailure::Entries(err)
    }
}

/// The bridge: all configured installations and their runtime state
pub struct Bridge {
    entries: Arc<ConfigEntries>,
    smartapp: Arc<SmartAppManager>,
    loaded: DashMap<String, LoadedEntry>,
    api_base_url: Option<String>,
}

impl Bridge {
    pub fn new(
        entries: Arc<ConfigEntries>,
        smartapp: Arc<SmartAppManager>,
        api_base_url: Option<String>,
    ) -> Self {
        Self {
            entries,
            smartapp,
            loaded: DashMap::new(),
            api_base_url,
        }
    }

    pub fn entries(&self) -> &Arc<ConfigEntries> {
        &self.entries
    }

    pub fn smartapp(&self) -> &Arc<SmartAppManager> {
        &self.smartapp
    }

    /// The broker of a loaded entry
    pub fn broker(&self, entry_id: &str) -> Option<Arc<DeviceBroker>> {
        self.loaded.get(entry_id).map(|l| Arc::clone(&l.broker))
    }

    /// The entity registry of a loaded entry
    pub fn registry(&self, entry_id: &str) -> Option<Arc<EntityRegistry>> {
        self.loaded.get(entry_id).map(|l| Arc::clone(&l.registry))
    }

    pub fn is_loaded(&self, entry_id: &str) -> bool {
        self.loaded.contains_key(entry_id)
    }

    fn client_for(&self, access_token: &str) -> SmartThings {
        match &self.api_base_url {
            Some(base) => SmartThings::new(access_token)
                .with_base_url(base.clone())
                .with_token_url(format!("{base}/oauth/token")),
            None => SmartThings::new(access_token),
        }
    }

    /// Initialize a config entry which represents an installed SmartApp
    pub async fn setup_entry(&self, entry_id: &str) -> Result<(), BridgeError> {
        let entry = self
            .entries
            .get(entry_id)
            .ok_or_else(|| BridgeError::NotFound(entry_id.to_string()))?;

        if !entry.data.has_valid_ids() {
            warn!(
                entry = %entry.title,
                "Entry carries malformed SmartThings ids"
            );
        }

        self.entries
            .set_state(entry_id, ConfigEntryState::SetupInProgress, None);

        match self.setup_inner(&entry).await {
            Ok(loaded) => {
                self.loaded.insert(entry_id.to_string(), loaded);
                self.entries
                    .set_state(entry_id, ConfigEntryState::Loaded, None);
                info!(entry = %entry.title, "Setup completed");
                Ok(())
            }
            Err(SetupFailure::Api(err)) if err.is_auth_error() => {
                error!(
                    entry = %entry.title,
                    error = %err,
                    "Unable to setup configuration entry - please reconfigure the integration"
                );
                // The entry cannot recover with its stored credentials;
                // remove it so a fresh authorization is performed.
                self.remove_entry(entry_id).await?;
                Err(BridgeError::AuthRevoked)
            }
            Err(SetupFailure::Api(err)) => {
                debug!(entry = %entry.title, error = %err, "Setup not ready");
                self.entries.set_state(
                    entry_id,
                    ConfigEntryState::SetupRetry,
                    Some(err.to_string()),
                );
                Err(BridgeError::NotReady(err.to_string()))
            }
            Err(SetupFailure::NotAuthorized) => {
                let reason = "installed app is not authorized".to_string();
                self.entries.set_state(
                    entry_id,
                    ConfigEntryState::SetupRetry,
                    Some(reason.clone()),
                );
                Err(BridgeError::NotReady(reason))
            }
            Err(SetupFailure::Entries(err)) => Err(err.into()),
        }
    }

    async fn setup_inner(&self, entry: &ConfigEntry) -> Result<LoadedEntry, SetupFailure> {
        let api = self.client_for(&entry.data.access_token);

        // Validate the app and the installed app instance.
        let app = api.app(&entry.data.app_id).await?;
        debug!(app = %app.app_name, "Validated SmartApp");

        let installed_app = api.installed_app(&entry.data.installed_app_id).await?;
        if !installed_app.is_authorized() {
            return Err(SetupFailure::NotAuthorized);
        }

        let rooms = api.rooms(&entry.data.location_id).await?;

        // A token without scene access is not fatal: no scenes available.
        let scenes = match api.scenes(&entry.data.location_id).await {
            Ok(scenes) => scenes,
            Err(err) if err.is_forbidden() => {
                warn!(
                    entry = %entry.title,
                    "Unable to load scenes because the access token does not have the required access"
                );
                Vec::new()
            }
            Err(err) => return Err(err.into()),
        };

        // Rotate the token pair and persist the new refresh token before
        // relying on it; the old one is invalidated by the exchange.
        let token = api
            .generate_tokens(
                &entry.data.client_id,
                &entry.data.client_secret,
                &entry.data.refresh_token,
            )
            .await?;
        self.entries
            .update_refresh_token(&entry.entry_id, &token.refresh_token)
            .await?;

        // Fetch devices and their current status; the refreshes run
        // concurrently so a slow or failing device does not block the rest.
        let mut devices = api.devices(&installed_app.location_id).await?;
        let results = join_all(devices.iter().map(|d| api.refresh_device_status(d))).await;
        let mut results = results.into_iter();
        devices.retain(|device| {
            let ok = results.next().map(|r| r.is_ok()).unwrap_or(false);
            if !ok {
                debug!(
                    device = %device.label,
                    device_id = %device.device_id,
                    "Unable to update status for device, the device will be excluded"
                );
            }
            ok
        });

        for device in &devices {
            debug!(
                device = %device.label,
                components = ?device.components.keys().collect::<Vec<_>>(),
                capabilities = ?device.capabilities,
                "Adding device"
            );
        }

        let broker = Arc::new(DeviceBroker::new(
            entry,
            token,
            api.clone(),
            Arc::clone(&self.entries),
            Arc::clone(&self.smartapp),
            devices,
            rooms,
            scenes,
        ));
        broker.connect();

        let commands: Arc<dyn DeviceCommands> = Arc::new(api);
        let registry = Arc::new(EntityRegistry::setup(&broker, commands));
        let listeners = spawn_listeners(Arc::clone(&registry), &broker);

        Ok(LoadedEntry {
            broker,
            registry,
            listeners,
        })
    }

    /// Unload a config entry; true when it was loaded
    pub fn unload_entry(&self, entry_id: &str) -> bool {
        let Some((_, loaded)) = self.loaded.remove(entry_id) else {
            return false;
        };
        loaded.broker.disconnect();
        for handle in loaded.listeners {
            handle.abort();
        }
        self.entries
            .set_state(entry_id, ConfigEntryState::NotLoaded, None);
        info!(entry = entry_id, "Unloaded entry");
        true
    }

    /// Perform clean-up when an entry is being removed
    ///
    /// The entry is removed locally first, then the installed app is
    /// deleted from the cloud, and the parent app as well when no other
    /// entry references it. 403 on either delete means already removed.
    pub async fn remove_entry(&self, entry_id: &str) -> Result<(), BridgeError> {
        let Some(entry) = self.entries.get(entry_id) else {
            return Err(BridgeError::NotFound(entry_id.to_string()));
        };

        self.unload_entry(entry_id);
        self.entries.remove(entry_id).await?;

        let api = self.client_for(&entry.data.access_token);
        let installed_app_id = &entry.data.installed_app_id;
        match api.delete_installed_app(installed_app_id).await {
            Ok(()) => debug!(installed_app = %installed_app_id, "Removed installed app"),
            Err(err) if err.is_forbidden() => {
                debug!(installed_app = %installed_app_id, "Installed app has already been removed");
            }
            Err(err) => {
                warn!(installed_app = %installed_app_id, error = %err, "Failed to remove installed app");
            }
        }

        let app_id = &entry.data.app_id;
        if self.entries.count_entries_for_app(app_id) > 0 {
            debug!(
                app = %app_id,
                "App was not removed because it is in use by other configuration entries"
            );
            return Ok(());
        }
        match api.delete_app(app_id).await {
            Ok(()) => debug!(app = %app_id, "Removed app"),
            Err(err) if err.is_forbidden() => {
                debug!(app = %app_id, "App has already been removed");
            }
            Err(err) => {
                warn!(app = %app_id, error = %err, "Failed to remove app");
            }
        }

        Ok(())
    }

    /// Handle migration of a previous version config entry
    ///
    /// An entry created under a previous version must go through setup
    /// again to retrieve the data elements it is missing, so it is removed
    /// and a fresh authorization is required. Returns false when the entry
    /// could not be migrated in place.
    pub async fn migrate_entry(&self, entry_id: &str) -> Result<bool, BridgeError> {
        let entry = self
            .entries
            .get(entry_id)
            .ok_or_else(|| BridgeError::NotFound(entry_id.to_string()))?;

        if !entry.needs_migration() {
            return Ok(true);
        }

        warn!(
            entry = %entry.title,
            version = entry.version,
            "Entry predates the current schema; removing it, reconfiguration required"
        );
        self.remove_entry(entry_id).await?;
        Ok(false)
    }

    /// Set up every stored entry, migrating where needed
    pub async fn setup_all(&self) {
        for entry_id in self.entries.entry_ids() {
            match self.migrate_entry(&entry_id).await {
                Ok(true) => {}
                Ok(false) => continue,
                Err(err) => {
                    warn!(entry = %entry_id, error = %err, "Migration failed");
                    continue;
                }
            }
            if let Err(err) = self.setup_entry(&entry_id).await {
                warn!(entry = %entry_id, error = %err, "Setup failed");
            }
        }
    }

    /// Unload every loaded entry (shutdown path)
    pub fn unload_all(&self) {
        let entry_ids: Vec<String> = self.loaded.iter().map(|l| l.key().clone()).collect();
        for entry_id in entry_ids {
            self.unload_entry(&entry_id);
        }
    }
}
