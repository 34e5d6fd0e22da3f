//! Entity registry and render loop
//!
//! Holds the platform entities constructed for one config entry and
//! re-reads their state whenever the broker signals a change. Rendering is
//! the bridge's host surface: one state string plus attributes per entity,
//! with lookup failures rendered as `unavailable`.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use st_broker::DeviceBroker;
use st_core::DeviceId;
use st_platforms::entity::{DeviceCommands, EntityResult};
use st_platforms::{binary_sensor, event, fan, light, lock, select, sensor, Platform, PLATFORMS};

/// Rendered state of one entity
#[derive(Debug, Clone, PartialEq)]
pub struct EntityState {
    pub state: String,
    pub attributes: HashMap<String, Value>,
}

impl EntityState {
    fn new(state: impl Into<String>) -> Self {
        Self {
            state: state.into(),
            attributes: HashMap::new(),
        }
    }

    fn with_attribute(mut self, key: &str, value: Value) -> Self {
        self.attributes.insert(key.to_string(), value);
        self
    }

    /// The state rendered when an attribute lookup fails
    pub fn unavailable() -> Self {
        Self::new("unavailable")
    }
}

fn render(result: EntityResult<EntityState>) -> EntityState {
    result.unwrap_or_else(|_| EntityState::unavailable())
}

/// All platform entities constructed for one config entry
pub struct EntityRegistry {
    binary_sensors: Vec<binary_sensor::SmartThingsBinarySensor>,
    events: Vec<event::SmartThingsEvent>,
    fans: Vec<fan::SmartThingsFan>,
    lights: Vec<light::SmartThingsLight>,
    locks: Vec<lock::SmartThingsLock>,
    selects: Vec<select::SmartThingsSelect>,
    sensors: Vec<sensor::SmartThingsSensor>,
}

impl EntityRegistry {
    /// Walk every broker-cached device through the platform tables, in the
    /// most-specific-platform-first order `PLATFORMS` defines
    pub fn setup(broker: &DeviceBroker, commands: Arc<dyn DeviceCommands>) -> Self {
        let mut registry = Self {
            binary_sensors: Vec::new(),
            events: Vec::new(),
            fans: Vec::new(),
            lights: Vec::new(),
            locks: Vec::new(),
            selects: Vec::new(),
            sensors: Vec::new(),
        };
        for platform in PLATFORMS {
            match platform {
                Platform::BinarySensor => {
                    registry.binary_sensors = binary_sensor::setup_entry(broker, &commands);
                }
                Platform::Event => registry.events = event::setup_entry(broker, &commands),
                Platform::Fan => registry.fans = fan::setup_entry(broker, &commands),
                Platform::Light => registry.lights = light::setup_entry(broker, &commands),
                Platform::Lock => registry.locks = lock::setup_entry(broker, &commands),
                Platform::Select => registry.selects = select::setup_entry(broker, &commands),
                Platform::Sensor => registry.sensors = sensor::setup_entry(broker, &commands),
            }
        }
        info!(entities = registry.len(), "Entity registry populated");
        registry
    }

    pub fn len(&self) -> usize {
        self.binary_sensors.len()
            + self.events.len()
            + self.fans.len()
            + self.lights.len()
            + self.locks.len()
            + self.selects.len()
            + self.sensors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Render the current state of every entity bound to one of the given
    /// devices
    pub fn render_devices(&self, devices: &HashSet<DeviceId>) -> Vec<(String, EntityState)> {
        let mut states = Vec::new();

        for entity in &self.binary_sensors {
            if devices.contains(entity.device_id()) {
                let state = render(entity.is_on().map(|on| {
                    EntityState::new(if on { "on" } else { "off" })
                }));
                states.push((entity.unique_id(), state));
            }
        }
        for entity in &self.fans {
            if devices.contains(entity.device_id()) {
                let state = render(entity.is_on().and_then(|on| {
                    let percentage = entity.percentage()?;
                    Ok(EntityState::new(if on { "on" } else { "off" })
                        .with_attribute("percentage", percentage.into()))
                }));
                states.push((entity.unique_id(), state));
            }
        }
        for entity in &self.lights {
            if devices.contains(entity.device_id()) {
                let state = render(entity.is_on().and_then(|on| {
                    let brightness = entity.brightness()?;
                    Ok(EntityState::new(if on { "on" } else { "off" })
                        .with_attribute("brightness", brightness.into()))
                }));
                states.push((entity.unique_id(), state));
            }
        }
        for entity in &self.locks {
            if devices.contains(entity.device_id()) {
                let state = render(entity.is_locked().and_then(|locked| {
                    let mut state =
                        EntityState::new(if locked { "locked" } else { "unlocked" });
                    state.attributes.extend(entity.extra_state_attributes()?);
                    if let Some(changed_by) = entity.changed_by()? {
                        state
                            .attributes
                            .insert("changed_by".to_string(), changed_by.into());
                    }
                    Ok(state)
                }));
                states.push((entity.unique_id(), state));
            }
        }
        for entity in &self.selects {
            if devices.contains(entity.device_id()) {
                let state = render(entity.current_option().map(EntityState::new));
                states.push((entity.unique_id(), state));
            }
        }
        for entity in &self.sensors {
            if devices.contains(entity.device_id()) {
                let state = render(entity.native_value().and_then(|value| {
                    let rendered = match &value {
                        Value::String(s) => s.clone(),
                        Value::Null => "unknown".to_string(),
                        other => other.to_string(),
                    };
                    let mut state = EntityState::new(rendered);
                    if let Some(unit) = entity.native_unit_of_measurement()? {
                        state
                            .attributes
                            .insert("unit_of_measurement".to_string(), unit.into());
                    }
                    Ok(state)
                }));
                states.push((entity.unique_id(), state));
            }
        }

        states
    }

    /// Route a button signal to the event entities and render what fired
    pub fn fire_button_events(&self, devices: &HashSet<DeviceId>) -> Vec<(String, String)> {
        let mut fired = Vec::new();
        for entity in &self.events {
            match entity.handle_button_signal(devices) {
                Ok(Some(event_type)) => fired.push((entity.unique_id(), event_type)),
                Ok(None) => {}
                Err(err) => {
                    warn!(entity = %entity.unique_id(), error = %err, "Button event unavailable");
                }
            }
        }
        fired
    }
}

/// Subscribe the registry to a broker's signals
///
/// Spawns one listener task per signal channel; both re-read entity state
/// and log the result. The returned handles are aborted on unload.
pub fn spawn_listeners(
    registry: Arc<EntityRegistry>,
    broker: &Arc<DeviceBroker>,
) -> Vec<JoinHandle<()>> {
    let dispatcher = broker.dispatcher();

    let update_registry = Arc::clone(&registry);
    let mut updates = dispatcher.subscribe_update();
    let update_task = tokio::spawn(async move {
        loop {
            match updates.recv().await {
                Ok(devices) => {
                    for (entity_id, state) in update_registry.render_devices(&devices) {
                        info!(entity = %entity_id, state = %state.state, "State updated");
                    }
                }
                Err(RecvError::Lagged(missed)) => {
                    warn!(missed, "Update listener lagged");
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    let button_registry = Arc::clone(&registry);
    let mut buttons = dispatcher.subscribe_button();
    let button_task = tokio::spawn(async move {
        loop {
            match buttons.recv().await {
                Ok(devices) => {
                    for (entity_id, event_type) in button_registry.fire_button_events(&devices) {
                        info!(entity = %entity_id, event_type = %event_type, "Event fired");
                    }
                }
                Err(RecvError::Lagged(missed)) => {
                    warn!(missed, "Button listener lagged");
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    vec![update_task, button_task]
}
