//! Event entities
//!
//! Button devices surface presses as typed host events rather than state.
//! The adapter reacts to the broker's button signal: when its device is in
//! the delivered set, the cached button attribute value becomes the event
//! type to fire.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use st_broker::DeviceBroker;
use st_core::{Attribute, Capability, Component, DeviceId};

use crate::entity::{
    DeviceCommands, DeviceInfo, EntityCategory, EntityError, EntityResult, SmartThingsEntity,
};
use crate::Platform;

/// Device class hints for event entities
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventDeviceClass {
    Button,
}

/// Describes one event entity derived from a capability
#[derive(Debug, Clone, Copy)]
pub struct EventDescription {
    pub key: Attribute,
    pub name: &'static str,
    pub device_class: EventDeviceClass,
    pub entity_category: EntityCategory,
    pub event_types: &'static [&'static str],
}

pub const EVENT_DESCRIPTIONS: &[(Capability, &[EventDescription])] = &[(
    Capability::Button,
    &[EventDescription {
        key: Attribute::Button,
        name: "Pressed",
        device_class: EventDeviceClass::Button,
        entity_category: EntityCategory::Diagnostic,
        event_types: &["pushed", "double", "held"],
    }],
)];

fn descriptions_for(capability: Capability) -> Option<&'static [EventDescription]> {
    EVENT_DESCRIPTIONS
        .iter()
        .find(|(c, _)| *c == capability)
        .map(|(_, d)| *d)
}

/// Add event entities for a config entry's broker
pub fn setup_entry(
    broker: &DeviceBroker,
    commands: &Arc<dyn DeviceCommands>,
) -> Vec<SmartThingsEvent> {
    let mut entities = Vec::new();
    for device in broker.devices() {
        let room = broker.room_for(&device);
        for capability in broker.get_capabilities(&device) {
            if let Some(descriptions) = descriptions_for(capability) {
                for description in descriptions {
                    entities.push(SmartThingsEvent::new(
                        SmartThingsEntity::new(
                            Arc::clone(&device),
                            capability,
                            room.clone(),
                            Arc::clone(commands),
                            broker.dispatcher(),
                        ),
                        description,
                    ));
                }
            }
        }
    }
    entities
}

/// A SmartThings event entity
pub struct SmartThingsEvent {
    entity: SmartThingsEntity,
    description: &'static EventDescription,
    last_event: Mutex<Option<String>>,
}

impl SmartThingsEvent {
    pub fn new(entity: SmartThingsEntity, description: &'static EventDescription) -> Self {
        Self {
            entity,
            description,
            last_event: Mutex::new(None),
        }
    }

    pub fn name(&self) -> String {
        self.entity.name(Some(self.description.name))
    }

    pub fn unique_id(&self) -> String {
        self.entity.unique_id(Platform::Event, self.description.key)
    }

    pub fn device_info(&self) -> DeviceInfo {
        self.entity.device_info()
    }

    pub fn device_id(&self) -> &DeviceId {
        self.entity.device_id()
    }

    /// Event types this entity can fire
    pub fn event_types(&self) -> &'static [&'static str] {
        self.description.event_types
    }

    /// The most recently fired event type
    pub fn last_event(&self) -> Option<String> {
        self.last_event
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Handle a button-signal delivery
    ///
    /// When this entity's device is in the delivered set, the cached button
    /// attribute value is fired as the event type (no further payload).
    /// Returns the fired type, or `None` when the signal was for other
    /// devices.
    pub fn handle_button_signal(
        &self,
        devices: &HashSet<DeviceId>,
    ) -> EntityResult<Option<String>> {
        if !devices.contains(self.entity.device_id()) {
            return Ok(None);
        }

        let status = self.entity.attribute(Component::Main, self.description.key)?;
        let event_type = status
            .value
            .as_str()
            .ok_or(EntityError::InvalidValue {
                device: self.entity.device_id().clone(),
                attribute: self.description.key.as_str(),
            })?
            .to_string();

        *self
            .last_event
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(event_type.clone());
        Ok(Some(event_type))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::entity_for;
    use serde_json::json;
    use st_core::Device;

    fn button_device() -> Arc<Device> {
        let device = Device::new("d1".into(), "SmartThings Button", "Desk Button")
            .with_capabilities(vec![Capability::Button]);
        device
            .status
            .set_attribute("main", "button", json!("double").into());
        Arc::new(device)
    }

    fn description() -> &'static EventDescription {
        &EVENT_DESCRIPTIONS[0].1[0]
    }

    #[test]
    fn fires_cached_value_as_event_type() {
        let fx = entity_for(button_device(), Capability::Button, None);
        let event = SmartThingsEvent::new(fx.entity, description());

        let mut devices = HashSet::new();
        devices.insert(DeviceId::from("d1"));

        assert_eq!(
            event.handle_button_signal(&devices).unwrap(),
            Some("double".to_string())
        );
        assert_eq!(event.last_event(), Some("double".to_string()));
    }

    #[test]
    fn ignores_signals_for_other_devices() {
        let fx = entity_for(button_device(), Capability::Button, None);
        let event = SmartThingsEvent::new(fx.entity, description());

        let mut devices = HashSet::new();
        devices.insert(DeviceId::from("d-other"));

        assert_eq!(event.handle_button_signal(&devices).unwrap(), None);
        assert_eq!(event.last_event(), None);
    }

    #[test]
    fn known_event_types_are_exposed() {
        let fx = entity_for(button_device(), Capability::Button, None);
        let event = SmartThingsEvent::new(fx.entity, description());
        assert_eq!(event.event_types(), &["pushed", "double", "held"]);
    }
}
