//! Binary sensor entities
//!
//! Each description supplies the predicate that turns a raw attribute value
//! into an on/off state.

use std::sync::Arc;

use serde_json::Value;

use st_broker::DeviceBroker;
use st_core::{Attribute, Capability, Component};

use crate::entity::{
    DeviceCommands, DeviceInfo, EntityCategory, EntityResult, SmartThingsEntity,
};
use crate::Platform;

/// Device class hints for binary sensors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinarySensorDeviceClass {
    Door,
    Lock,
    Moisture,
    Tamper,
}

/// Describes one binary sensor entity derived from a capability
#[derive(Debug, Clone, Copy)]
pub struct BinarySensorDescription {
    pub key: Attribute,
    pub name: &'static str,
    pub device_class: BinarySensorDeviceClass,
    pub entity_category: EntityCategory,
    pub is_on: fn(&Value) -> bool,
}

fn is_unlocked(value: &Value) -> bool {
    value.as_str() == Some("unlocked")
}

fn is_detected(value: &Value) -> bool {
    value.as_str() == Some("detected")
}

fn is_wet(value: &Value) -> bool {
    value.as_str() == Some("wet")
}

fn is_open(value: &Value) -> bool {
    value.as_str() == Some("open")
}

pub const BINARY_SENSOR_DESCRIPTIONS: &[(Capability, &[BinarySensorDescription])] = &[
    (
        Capability::Lock,
        &[BinarySensorDescription {
            key: Attribute::Lock,
            name: "Status",
            device_class: BinarySensorDeviceClass::Lock,
            entity_category: EntityCategory::Diagnostic,
            is_on: is_unlocked,
        }],
    ),
    (
        Capability::TamperAlert,
        &[BinarySensorDescription {
            key: Attribute::Tamper,
            name: "Tamper Detected",
            device_class: BinarySensorDeviceClass::Tamper,
            entity_category: EntityCategory::Diagnostic,
            is_on: is_detected,
        }],
    ),
    (
        Capability::WaterSensor,
        &[BinarySensorDescription {
            key: Attribute::Water,
            name: "Water Detected",
            device_class: BinarySensorDeviceClass::Moisture,
            entity_category: EntityCategory::Diagnostic,
            is_on: is_wet,
        }],
    ),
    (
        Capability::DoorState,
        &[BinarySensorDescription {
            key: Attribute::DoorState,
            name: "Door State",
            device_class: BinarySensorDeviceClass::Door,
            entity_category: EntityCategory::Diagnostic,
            is_on: is_open,
        }],
    ),
];

fn descriptions_for(capability: Capability) -> Option<&'static [BinarySensorDescription]> {
    BINARY_SENSOR_DESCRIPTIONS
        .iter()
        .find(|(c, _)| *c == capability)
        .map(|(_, d)| *d)
}

/// Add binary sensor entities for a config entry's broker
pub fn setup_entry(
    broker: &DeviceBroker,
    commands: &Arc<dyn DeviceCommands>,
) -> Vec<SmartThingsBinarySensor> {
    let mut entities = Vec::new();
    for device in broker.devices() {
        let room = broker.room_for(&device);
        for capability in broker.get_capabilities(&device) {
            if let Some(descriptions) = descriptions_for(capability) {
                for description in descriptions {
                    entities.push(SmartThingsBinarySensor::new(
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

/// A SmartThings binary sensor entity
pub struct SmartThingsBinarySensor {
    entity: SmartThingsEntity,
    description: &'static BinarySensorDescription,
}

impl SmartThingsBinarySensor {
    pub fn new(entity: SmartThingsEntity, description: &'static BinarySensorDescription) -> Self {
        Self {
            entity,
            description,
        }
    }

    pub fn name(&self) -> String {
        self.entity.name(Some(self.description.name))
    }

    pub fn unique_id(&self) -> String {
        self.entity.unique_id(Platform::BinarySensor, self.description.key)
    }

    pub fn device_info(&self) -> DeviceInfo {
        self.entity.device_info()
    }

    pub fn device_class(&self) -> BinarySensorDeviceClass {
        self.description.device_class
    }

    /// Return true if the binary sensor is on
    pub fn is_on(&self) -> EntityResult<bool> {
        let status = self.entity.attribute(Component::Main, self.description.key)?;
        Ok((self.description.is_on)(&status.value))
    }

    pub fn device_id(&self) -> &st_core::DeviceId {
        self.entity.device_id()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::entity_for;
    use serde_json::json;
    use st_core::Device;

    fn lock_device(value: &str) -> Arc<Device> {
        let device = Device::new("d1".into(), "Deadbolt", "Front Door")
            .with_capabilities(vec![Capability::Lock]);
        device
            .status
            .set_attribute("main", "lock", json!(value).into());
        Arc::new(device)
    }

    #[test]
    fn lock_status_reports_inverse_of_locked() {
        let fx = entity_for(lock_device("unlocked"), Capability::Lock, None);
        let sensor = SmartThingsBinarySensor::new(fx.entity, &BINARY_SENSOR_DESCRIPTIONS[0].1[0]);

        assert!(sensor.is_on().unwrap());
        assert_eq!(sensor.name(), "Front Door Status");
        assert_eq!(sensor.unique_id(), "d1-binary_sensor-lock");
    }

    #[test]
    fn locked_value_reads_off() {
        let fx = entity_for(lock_device("locked"), Capability::Lock, None);
        let sensor = SmartThingsBinarySensor::new(fx.entity, &BINARY_SENSOR_DESCRIPTIONS[0].1[0]);
        assert!(!sensor.is_on().unwrap());
    }

    #[test]
    fn missing_attribute_surfaces_error() {
        let device = Arc::new(
            Device::new("d1".into(), "Deadbolt", "Front Door")
                .with_capabilities(vec![Capability::Lock]),
        );
        let fx = entity_for(device, Capability::Lock, None);
        let sensor = SmartThingsBinarySensor::new(fx.entity, &BINARY_SENSOR_DESCRIPTIONS[0].1[0]);
        assert!(sensor.is_on().is_err());
    }
}
