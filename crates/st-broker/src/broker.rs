//! The device broker
//!
//! Constructed once per configured installation with already-fetched
//! devices, rooms, and scenes. Routes webhook events into the status caches
//! and keeps the installation's refresh token alive.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use st_api::{OAuthToken, SmartThings};
use st_config_entries::{ConfigEntries, ConfigEntry};
use st_core::{
    Capability, Device, DeviceId, EventBatch, EventType, InstalledAppId, Room, RoomId, Scene,
    SceneId,
};

use crate::dispatcher::Dispatcher;
use crate::smartapp::SmartAppManager;

/// Refresh tokens expire in 30 days and once expired cannot be recovered,
/// so a new pair is derived well inside that window.
pub const TOKEN_REFRESH_INTERVAL: Duration = Duration::from_secs(14 * 24 * 60 * 60);

/// Manages an individual SmartThings config entry
pub struct DeviceBroker {
    entry_id: String,
    installed_app_id: InstalledAppId,
    api: SmartThings,
    entries: Arc<ConfigEntries>,
    smartapp: Arc<SmartAppManager>,
    dispatcher: Arc<Dispatcher>,

    devices: DashMap<DeviceId, Arc<Device>>,
    rooms: DashMap<RoomId, Room>,
    scenes: DashMap<SceneId, Scene>,

    token: Mutex<OAuthToken>,
    refresh_task: Mutex<Option<JoinHandle<()>>>,
    event_task: Mutex<Option<JoinHandle<()>>>,
}

impl DeviceBroker {
    /// Create a new instance of the DeviceBroker
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        entry: &ConfigEntry,
        token: OAuthToken,
        api: SmartThings,
        entries: Arc<ConfigEntries>,
        smartapp: Arc<SmartAppManager>,
        devices: Vec<Device>,
        rooms: Vec<Room>,
        scenes: Vec<Scene>,
    ) -> Self {
        Self {
            entry_id: entry.entry_id.clone(),
            installed_app_id: entry.data.installed_app_id.clone(),
            api,
            entries,
            smartapp,
            dispatcher: Arc::new(Dispatcher::new()),
            devices: devices
                .into_iter()
                .map(|d| (d.device_id.clone(), Arc::new(d)))
                .collect(),
            rooms: rooms.into_iter().map(|r| (r.room_id.clone(), r)).collect(),
            scenes: scenes
                .into_iter()
                .map(|s| (s.scene_id.clone(), s))
                .collect(),
            token: Mutex::new(token),
            refresh_task: Mutex::new(None),
            event_task: Mutex::new(None),
        }
    }

    /// The config entry this broker serves
    pub fn entry_id(&self) -> &str {
        &self.entry_id
    }

    /// The installed application instance this broker serves
    pub fn installed_app_id(&self) -> &InstalledAppId {
        &self.installed_app_id
    }

    /// The broker-owned signal dispatcher
    pub fn dispatcher(&self) -> Arc<Dispatcher> {
        Arc::clone(&self.dispatcher)
    }

    /// Look up one cached device
    pub fn device(&self, device_id: &DeviceId) -> Option<Arc<Device>> {
        self.devices.get(device_id).map(|d| Arc::clone(&d))
    }

    /// Snapshot of all cached devices
    pub fn devices(&self) -> Vec<Arc<Device>> {
        self.devices.iter().map(|d| Arc::clone(&d)).collect()
    }

    /// Look up one cached room
    pub fn room(&self, room_id: &RoomId) -> Option<Room> {
        self.rooms.get(room_id).map(|r| r.clone())
    }

    /// The room a device is placed in, if any
    pub fn room_for(&self, device: &Device) -> Option<Room> {
        device.room_id.as_ref().and_then(|id| self.room(id))
    }

    /// Snapshot of all cached scenes
    pub fn scenes(&self) -> Vec<Scene> {
        self.scenes.iter().map(|s| s.clone()).collect()
    }

    /// Flatten a device's root capabilities with all of its named
    /// components' capabilities into one ordered sequence
    ///
    /// Components are appended after the root, otherwise insertion order.
    /// Platform modules are walked most-specific first, so this order
    /// decides which platform claims an attribute.
    pub fn get_capabilities(&self, device: &Device) -> Vec<Capability> {
        let mut capabilities = device.capabilities.clone();
        for component_capabilities in device.components.values() {
            capabilities.extend(component_capabilities.iter().copied());
        }
        capabilities
    }

    /// The most recently generated token pair
    pub fn token(&self) -> OAuthToken {
        self.token
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Connect handlers/listeners for device/lifecycle events
    ///
    /// Registers the periodic refresh-token regeneration and subscribes to
    /// the incoming event channel. Must run on a tokio runtime.
    pub fn connect(self: &Arc<Self>) {
        let broker = Arc::clone(self);
        let refresh = tokio::spawn(async move {
            let mut interval = tokio::time::interval(TOKEN_REFRESH_INTERVAL);
            // The first tick completes immediately; setup just generated a
            // fresh pair, so skip it.
            interval.tick().await;
            loop {
                interval.tick().await;
                broker.regenerate_refresh_token().await;
            }
        });

        let broker = Arc::clone(self);
        let mut events = self.smartapp.subscribe();
        let event = tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(batch) => broker.handle_events(&batch),
                    Err(RecvError::Lagged(missed)) => {
                        warn!(missed, "Event subscription lagged; batches dropped");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        });

        self.store_handle(&self.refresh_task, refresh);
        self.store_handle(&self.event_task, event);
        debug!(installed_app = %self.installed_app_id, "Broker connected");
    }

    /// Disconnect handlers/listeners for device/lifecycle events
    ///
    /// Idempotent: released handles are not touched again.
    pub fn disconnect(&self) {
        if let Some(handle) = self.take_handle(&self.refresh_task) {
            handle.abort();
        }
        if let Some(handle) = self.take_handle(&self.event_task) {
            handle.abort();
        }
        debug!(installed_app = %self.installed_app_id, "Broker disconnected");
    }

    fn store_handle(&self, slot: &Mutex<Option<JoinHandle<()>>>, handle: JoinHandle<()>) {
        let mut guard = slot.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = guard.replace(handle) {
            previous.abort();
        }
    }

    fn take_handle(&self, slot: &Mutex<Option<JoinHandle<()>>>) -> Option<JoinHandle<()>> {
        slot.lock().unwrap_or_else(PoisonError::into_inner).take()
    }

    /// Generate a new token pair and persist the rotated refresh token
    ///
    /// A failed regeneration is logged and retried on the next interval
    /// tick; nothing else backs this off.
    async fn regenerate_refresh_token(&self) {
        let Some(entry) = self.entries.get(&self.entry_id) else {
            warn!(entry = %self.entry_id, "Entry gone; skipping token regeneration");
            return;
        };

        let refresh_token = self.token().refresh_token;
        match self
            .api
            .generate_tokens(&entry.data.client_id, &entry.data.client_secret, &refresh_token)
            .await
        {
            Ok(token) => {
                if let Err(err) = self
                    .entries
                    .update_refresh_token(&self.entry_id, &token.refresh_token)
                    .await
                {
                    warn!(error = %err, "Failed to persist rotated refresh token");
                }
                *self.token.lock().unwrap_or_else(PoisonError::into_inner) = token;
                debug!(
                    installed_app = %self.installed_app_id,
                    "Regenerated refresh token"
                );
            }
            Err(err) => {
                warn!(
                    installed_app = %self.installed_app_id,
                    error = %err,
                    "Token regeneration failed; retrying on the next interval"
                );
            }
        }
    }

    /// Broker for incoming events
    ///
    /// Applies every device event in the batch to its status cache in
    /// delivery order, then emits at most one signal per non-empty set of
    /// affected devices. Entities reacting to either signal therefore see a
    /// cache that already reflects the whole batch.
    pub fn handle_events(&self, batch: &EventBatch) {
        // Do not process events received from a different installed app
        // under the same parent SmartApp (valid use-scenario).
        if batch.installed_app_id != self.installed_app_id {
            return;
        }

        let mut updated_buttons: HashSet<DeviceId> = HashSet::new();
        let mut updated_devices: HashSet<DeviceId> = HashSet::new();

        for event in &batch.events {
            if event.event_type != EventType::DeviceEvent {
                continue;
            }
            // Device absent from the cache, e.g. excluded at setup because
            // its status could not be fetched.
            let Some(device) = self.device(&event.device_id) else {
                continue;
            };

            device.status.apply_attribute_update(
                &event.component_id,
                &event.attribute,
                event.value.clone(),
                event.data.clone(),
            );

            if event.is_button_press() {
                debug!(
                    device = %event.device_id,
                    value = %event.value,
                    "Button pressed"
                );
                updated_buttons.insert(event.device_id.clone());
            } else {
                debug!(
                    device = %event.device_id,
                    component = %event.component_id,
                    attribute = %event.attribute,
                    value = %event.value,
                    "Update received"
                );
                updated_devices.insert(event.device_id.clone());
            }
        }

        if !updated_buttons.is_empty() {
            self.dispatcher.send_button(updated_buttons);
        }
        if !updated_devices.is_empty() {
            self.dispatcher.send_update(updated_devices);
        }
    }
}
