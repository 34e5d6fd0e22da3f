//! Sensor entities
//!
//! Numeric and enumerated attributes pass through an optional value
//! transform; units of measurement translate through a small fixed symbol
//! table with fallback to the raw unit string.

use std::sync::Arc;

use chrono::DateTime;
use serde_json::{json, Value};

use st_broker::DeviceBroker;
use st_core::{Attribute, Capability, Component, DeviceId};

use crate::entity::{
    DeviceCommands, DeviceInfo, EntityCategory, EntityResult, SmartThingsEntity,
};
use crate::Platform;

/// Oven modes as reported by Samsung appliances → host labels
const OVEN_MODE_MAP: &[(&str, &str)] = &[
    ("Autocook", "autocook"),
    ("ConvectionBake", "convection_bake"),
    ("ConvectionRoast", "convection_roast"),
    ("KeepWarm", "keep_warm"),
    ("Microwave", "microwave"),
    ("MicroWave", "microwave"),
    ("NoOperation", "no_operation"),
    ("Others", "other"),
    ("warming", "warming"),
    ("SpeedBake", "speed_bake"),
    ("SpeedRoast", "speed_roast"),
    ("SteamClean", "steam_clean"),
];

/// Reported unit symbol → unit of measurement
const UNIT_MAP: &[(&str, &str)] = &[("C", "°C"), ("F", "°F"), ("%", "%")];

const TEMP_FAHRENHEIT: &str = "°F";
const PERCENTAGE: &str = "%";

/// Device class hints for sensors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorDeviceClass {
    Battery,
    Temperature,
    Timestamp,
}

/// State class hints for sensors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorStateClass {
    Measurement,
}

/// Describes one sensor entity derived from a capability
#[derive(Debug, Clone, Copy)]
pub struct SensorDescription {
    pub key: Attribute,
    pub name: &'static str,
    pub device_class: Option<SensorDeviceClass>,
    pub state_class: Option<SensorStateClass>,
    pub native_unit: Option<&'static str>,
    pub entity_category: EntityCategory,
    pub native_value: fn(&Value) -> Value,
}

impl SensorDescription {
    const fn new(key: Attribute, name: &'static str) -> Self {
        Self {
            key,
            name,
            device_class: None,
            state_class: None,
            native_unit: None,
            entity_category: EntityCategory::Diagnostic,
            native_value: identity,
        }
    }

    const fn device_class(mut self, device_class: SensorDeviceClass) -> Self {
        self.device_class = Some(device_class);
        self
    }

    const fn state_class(mut self, state_class: SensorStateClass) -> Self {
        self.state_class = Some(state_class);
        self
    }

    const fn native_unit(mut self, unit: &'static str) -> Self {
        self.native_unit = Some(unit);
        self
    }

    const fn native_value(mut self, transform: fn(&Value) -> Value) -> Self {
        self.native_value = transform;
        self
    }
}

fn identity(value: &Value) -> Value {
    value.clone()
}

fn oven_mode_label(value: &Value) -> Value {
    match value.as_str() {
        Some(mode) => OVEN_MODE_MAP
            .iter()
            .find(|(raw, _)| *raw == mode)
            .map(|(_, label)| json!(label))
            .unwrap_or_else(|| value.clone()),
        None => value.clone(),
    }
}

/// Normalize a reported completion timestamp; unparseable input reads null
fn parse_timestamp(value: &Value) -> Value {
    value
        .as_str()
        .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
        .map(|dt| json!(dt.to_rfc3339()))
        .unwrap_or(Value::Null)
}

pub const SENSOR_DESCRIPTIONS: &[(Capability, &[SensorDescription])] = &[
    (
        Capability::Battery,
        &[SensorDescription::new(Attribute::Battery, "Battery")
            .device_class(SensorDeviceClass::Battery)
            .state_class(SensorStateClass::Measurement)
            .native_unit(PERCENTAGE)],
    ),
    (
        Capability::OvenMode,
        &[SensorDescription::new(Attribute::OvenMode, "Oven Mode").native_value(oven_mode_label)],
    ),
    (
        Capability::OvenOperatingState,
        &[
            SensorDescription::new(Attribute::CompletionTime, "Oven Completion Time")
                .device_class(SensorDeviceClass::Timestamp)
                .native_value(parse_timestamp),
            SensorDescription::new(Attribute::OvenJobState, "Oven Job State"),
            SensorDescription::new(Attribute::MachineState, "Oven Machine State"),
        ],
    ),
    (
        Capability::OvenSetpoint,
        &[SensorDescription::new(Attribute::OvenSetpoint, "Oven Set Point")
            .device_class(SensorDeviceClass::Temperature)
            .state_class(SensorStateClass::Measurement)
            .native_unit(TEMP_FAHRENHEIT)],
    ),
    (
        Capability::TemperatureMeasurement,
        &[
            SensorDescription::new(Attribute::Temperature, "Temperature Measurement")
                .device_class(SensorDeviceClass::Temperature)
                .state_class(SensorStateClass::Measurement),
        ],
    ),
];

fn descriptions_for(capability: Capability) -> Option<&'static [SensorDescription]> {
    SENSOR_DESCRIPTIONS
        .iter()
        .find(|(c, _)| *c == capability)
        .map(|(_, d)| *d)
}

/// Add sensor entities for a config entry's broker
pub fn setup_entry(
    broker: &DeviceBroker,
    commands: &Arc<dyn DeviceCommands>,
) -> Vec<SmartThingsSensor> {
    let mut entities = Vec::new();
    for device in broker.devices() {
        let room = broker.room_for(&device);
        for capability in broker.get_capabilities(&device) {
            if let Some(descriptions) = descriptions_for(capability) {
                for description in descriptions {
                    entities.push(SmartThingsSensor::new(
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

/// A SmartThings sensor entity
pub struct SmartThingsSensor {
    entity: SmartThingsEntity,
    description: &'static SensorDescription,
}

impl SmartThingsSensor {
    pub fn new(entity: SmartThingsEntity, description: &'static SensorDescription) -> Self {
        Self {
            entity,
            description,
        }
    }

    pub fn name(&self) -> String {
        self.entity.name(Some(self.description.name))
    }

    pub fn unique_id(&self) -> String {
        self.entity.unique_id(Platform::Sensor, self.description.key)
    }

    pub fn device_info(&self) -> DeviceInfo {
        self.entity.device_info()
    }

    pub fn device_id(&self) -> &DeviceId {
        self.entity.device_id()
    }

    pub fn device_class(&self) -> Option<SensorDeviceClass> {
        self.description.device_class
    }

    pub fn state_class(&self) -> Option<SensorStateClass> {
        self.description.state_class
    }

    /// Return the state of the sensor
    pub fn native_value(&self) -> EntityResult<Value> {
        let status = self.entity.attribute(Component::Main, self.description.key)?;
        Ok((self.description.native_value)(&status.value))
    }

    /// Return the unit this state is expressed in
    ///
    /// The unit reported with the attribute wins, translated through the
    /// symbol table; the description's unit is the fallback.
    pub fn native_unit_of_measurement(&self) -> EntityResult<Option<String>> {
        let status = self.entity.attribute(Component::Main, self.description.key)?;
        if let Some(unit) = status.unit {
            let mapped = UNIT_MAP
                .iter()
                .find(|(raw, _)| *raw == unit)
                .map(|(_, mapped)| (*mapped).to_string())
                .unwrap_or(unit);
            return Ok(Some(mapped));
        }
        Ok(self.description.native_unit.map(str::to_string))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::entity_for;
    use st_core::{AttributeStatus, Device};

    fn device_with(attribute: &str, status: AttributeStatus, capability: Capability) -> Arc<Device> {
        let device = Device::new("d1".into(), "Samsung Microwave", "Microwave")
            .with_capabilities(vec![capability]);
        device.status.set_attribute("main", attribute, status);
        Arc::new(device)
    }

    fn sensor_for(
        device: Arc<Device>,
        capability: Capability,
        description: &'static SensorDescription,
    ) -> SmartThingsSensor {
        let fx = entity_for(device, capability, None);
        SmartThingsSensor::new(fx.entity, description)
    }

    #[test]
    fn battery_passes_through_with_description_unit() {
        let device = device_with("battery", json!(85).into(), Capability::Battery);
        let sensor = sensor_for(device, Capability::Battery, &SENSOR_DESCRIPTIONS[0].1[0]);

        assert_eq!(sensor.native_value().unwrap(), json!(85));
        assert_eq!(
            sensor.native_unit_of_measurement().unwrap(),
            Some("%".to_string())
        );
    }

    #[test]
    fn oven_mode_translates_known_labels() {
        let device = device_with("ovenMode", json!("ConvectionBake").into(), Capability::OvenMode);
        let sensor = sensor_for(device, Capability::OvenMode, &SENSOR_DESCRIPTIONS[1].1[0]);
        assert_eq!(sensor.native_value().unwrap(), json!("convection_bake"));

        let device = device_with("ovenMode", json!("SousVide").into(), Capability::OvenMode);
        let sensor = sensor_for(device, Capability::OvenMode, &SENSOR_DESCRIPTIONS[1].1[0]);
        // Unknown modes pass through unchanged.
        assert_eq!(sensor.native_value().unwrap(), json!("SousVide"));
    }

    #[test]
    fn completion_time_parses_timestamps() {
        let device = device_with(
            "completionTime",
            json!("2024-03-01T18:30:00Z").into(),
            Capability::OvenOperatingState,
        );
        let sensor = sensor_for(
            device,
            Capability::OvenOperatingState,
            &SENSOR_DESCRIPTIONS[2].1[0],
        );
        assert_eq!(
            sensor.native_value().unwrap(),
            json!("2024-03-01T18:30:00+00:00")
        );

        let device = device_with(
            "completionTime",
            json!("soon").into(),
            Capability::OvenOperatingState,
        );
        let sensor = sensor_for(
            device,
            Capability::OvenOperatingState,
            &SENSOR_DESCRIPTIONS[2].1[0],
        );
        assert_eq!(sensor.native_value().unwrap(), Value::Null);
    }

    #[test]
    fn reported_unit_translates_through_the_symbol_table() {
        let status = AttributeStatus {
            value: json!(72),
            unit: Some("F".to_string()),
            data: None,
        };
        let device = device_with("temperature", status, Capability::TemperatureMeasurement);
        let sensor = sensor_for(
            device,
            Capability::TemperatureMeasurement,
            &SENSOR_DESCRIPTIONS[4].1[0],
        );

        assert_eq!(
            sensor.native_unit_of_measurement().unwrap(),
            Some("°F".to_string())
        );
    }

    #[test]
    fn unknown_units_fall_back_to_the_raw_symbol() {
        let status = AttributeStatus {
            value: json!(3),
            unit: Some("lux".to_string()),
            data: None,
        };
        let device = device_with("temperature", status, Capability::TemperatureMeasurement);
        let sensor = sensor_for(
            device,
            Capability::TemperatureMeasurement,
            &SENSOR_DESCRIPTIONS[4].1[0],
        );

        assert_eq!(
            sensor.native_unit_of_measurement().unwrap(),
            Some("lux".to_string())
        );
    }
}
