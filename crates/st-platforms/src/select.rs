//! Select entities
//!
//! Configuration-style choices over a device-advertised option list. The
//! hood fan speed is numeric on the wire and translated through a fixed
//! integer ⇄ label table, filtered to the advertised min/max range.

use std::sync::Arc;

use serde_json::{json, Value};

use st_broker::DeviceBroker;
use st_core::{Attribute, Capability, Component, DeviceId};

use crate::entity::{
    DeviceCommands, DeviceInfo, EntityCategory, EntityError, EntityResult, SmartThingsEntity,
};
use crate::Platform;

/// Fixed translation for the numeric hood fan speed
const HOOD_FAN_SPEED_TO_STATE: &[(&str, &str)] = &[
    ("0", "off"),
    ("1", "low"),
    ("2", "medium"),
    ("3", "high"),
];

fn speed_to_state(speed: i64) -> Option<&'static str> {
    let key = speed.to_string();
    HOOD_FAN_SPEED_TO_STATE
        .iter()
        .find(|(s, _)| *s == key)
        .map(|(_, state)| *state)
}

fn state_to_speed(state: &str) -> Option<i64> {
    HOOD_FAN_SPEED_TO_STATE
        .iter()
        .find(|(_, s)| *s == state)
        .and_then(|(speed, _)| speed.parse().ok())
}

/// Describes one select entity derived from a capability
#[derive(Debug, Clone, Copy)]
pub struct SelectDescription {
    pub key: Attribute,
    pub name: &'static str,
    pub component: Component,
    pub entity_category: EntityCategory,
    /// Attribute listing the currently valid options
    pub options: Attribute,
    /// Command issued when an option is selected
    pub command: &'static str,
}

pub const SELECT_DESCRIPTIONS: &[(Capability, &[SelectDescription])] = &[
    (
        Capability::HoodFanSpeed,
        &[SelectDescription {
            key: Attribute::HoodFanSpeed,
            name: "Hood Fan Speed",
            component: Component::Hood,
            entity_category: EntityCategory::Config,
            options: Attribute::SupportedHoodFanSpeed,
            command: "setHoodFanSpeed",
        }],
    ),
    (
        Capability::Lamp,
        &[SelectDescription {
            key: Attribute::BrightnessLevel,
            name: "Lamp Brightness Level",
            component: Component::Hood,
            entity_category: EntityCategory::Config,
            options: Attribute::SupportedBrightnessLevel,
            command: "setBrightnessLevel",
        }],
    ),
];

fn descriptions_for(capability: Capability) -> Option<&'static [SelectDescription]> {
    SELECT_DESCRIPTIONS
        .iter()
        .find(|(c, _)| *c == capability)
        .map(|(_, d)| *d)
}

/// Add select entities for a config entry's broker
pub fn setup_entry(
    broker: &DeviceBroker,
    commands: &Arc<dyn DeviceCommands>,
) -> Vec<SmartThingsSelect> {
    let mut entities = Vec::new();
    for device in broker.devices() {
        let room = broker.room_for(&device);
        for capability in broker.get_capabilities(&device) {
            if let Some(descriptions) = descriptions_for(capability) {
                for description in descriptions {
                    entities.push(SmartThingsSelect::new(
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

/// A SmartThings select entity
pub struct SmartThingsSelect {
    entity: SmartThingsEntity,
    description: &'static SelectDescription,
}

impl SmartThingsSelect {
    pub fn new(entity: SmartThingsEntity, description: &'static SelectDescription) -> Self {
        Self {
            entity,
            description,
        }
    }

    pub fn name(&self) -> String {
        self.entity.name(Some(self.description.name))
    }

    pub fn unique_id(&self) -> String {
        self.entity.unique_id(Platform::Select, self.description.key)
    }

    pub fn device_info(&self) -> DeviceInfo {
        self.entity.device_info()
    }

    pub fn device_id(&self) -> &DeviceId {
        self.entity.device_id()
    }

    fn is_fan_speed(&self) -> bool {
        self.description.key == Attribute::HoodFanSpeed
    }

    /// Return valid options
    pub fn options(&self) -> EntityResult<Vec<String>> {
        let status = self
            .entity
            .attribute(self.description.component, self.description.options)?;
        let options = status
            .value
            .as_array()
            .ok_or(EntityError::InvalidValue {
                device: self.entity.device_id().clone(),
                attribute: self.description.options.as_str(),
            })?;

        if self.is_fan_speed() {
            let min_speed = self.int_attribute(Attribute::MinFanSpeed)?;
            let max_speed = self.int_attribute(Attribute::MaxFanSpeed)?;
            Ok(options
                .iter()
                .filter_map(Value::as_i64)
                .filter(|speed| *speed >= min_speed && *speed <= max_speed)
                .map(|speed| match speed_to_state(speed) {
                    Some(state) => state.to_string(),
                    None => speed.to_string(),
                })
                .collect())
        } else {
            Ok(options
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect())
        }
    }

    /// Return current option
    pub fn current_option(&self) -> EntityResult<String> {
        let status = self
            .entity
            .attribute(self.description.component, self.description.key)?;

        if self.is_fan_speed() {
            let speed = status.value.as_i64().ok_or(EntityError::InvalidValue {
                device: self.entity.device_id().clone(),
                attribute: self.description.key.as_str(),
            })?;
            Ok(match speed_to_state(speed) {
                Some(state) => state.to_string(),
                None => speed.to_string(),
            })
        } else {
            status
                .value
                .as_str()
                .map(str::to_string)
                .ok_or(EntityError::InvalidValue {
                    device: self.entity.device_id().clone(),
                    attribute: self.description.key.as_str(),
                })
        }
    }

    /// Change the selected option
    pub async fn select_option(&self, option: &str) -> EntityResult<()> {
        let argument = if self.is_fan_speed() {
            let speed = state_to_speed(option).ok_or(EntityError::InvalidValue {
                device: self.entity.device_id().clone(),
                attribute: self.description.key.as_str(),
            })?;
            json!(speed)
        } else {
            json!(option)
        };

        self.entity
            .command_with_update(
                self.description.component,
                self.description.command,
                vec![argument.clone()],
                self.description.key,
                argument,
            )
            .await
    }

    fn int_attribute(&self, key: Attribute) -> EntityResult<i64> {
        let status = self.entity.attribute(self.description.component, key)?;
        status.value.as_i64().ok_or(EntityError::InvalidValue {
            device: self.entity.device_id().clone(),
            attribute: key.as_str(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::entity_for;
    use st_core::Device;

    fn hood_device() -> Arc<Device> {
        let device = Device::new("d1".into(), "Samsung Microwave", "Microwave")
            .with_component("hood", vec![Capability::HoodFanSpeed, Capability::Lamp]);
        device
            .status
            .set_attribute("hood", "hoodFanSpeed", json!(2).into());
        device.status.set_attribute(
            "hood",
            "supportedHoodFanSpeed",
            json!([0, 1, 2, 3]).into(),
        );
        device
            .status
            .set_attribute("hood", "settableMinFanSpeed", json!(0).into());
        device
            .status
            .set_attribute("hood", "settableMaxFanSpeed", json!(2).into());
        device
            .status
            .set_attribute("hood", "brightnessLevel", json!("mid").into());
        device.status.set_attribute(
            "hood",
            "supportedBrightnessLevel",
            json!(["off", "low", "mid", "high"]).into(),
        );
        Arc::new(device)
    }

    fn fan_select(device: Arc<Device>) -> (SmartThingsSelect, crate::testutil::EntityFixture) {
        let fx = entity_for(Arc::clone(&device), Capability::HoodFanSpeed, None);
        let select = SmartThingsSelect::new(fx.entity.clone(), &SELECT_DESCRIPTIONS[0].1[0]);
        (select, fx)
    }

    fn lamp_select(device: Arc<Device>) -> (SmartThingsSelect, crate::testutil::EntityFixture) {
        let fx = entity_for(Arc::clone(&device), Capability::Lamp, None);
        let select = SmartThingsSelect::new(fx.entity.clone(), &SELECT_DESCRIPTIONS[1].1[0]);
        (select, fx)
    }

    #[test]
    fn fan_options_are_translated_and_range_filtered() {
        let (select, _fx) = fan_select(hood_device());
        // Advertised 0-3, settable max 2: "high" is filtered out.
        assert_eq!(select.options().unwrap(), vec!["off", "low", "medium"]);
        assert_eq!(select.current_option().unwrap(), "medium");
    }

    #[tokio::test]
    async fn selecting_a_fan_option_reverses_the_translation() {
        let device = hood_device();
        let (select, fx) = fan_select(device.clone());

        select.select_option("low").await.unwrap();

        let calls = fx.commands.calls();
        assert_eq!(calls[0].command, "setHoodFanSpeed");
        assert_eq!(calls[0].arguments, vec![json!(1)]);
        assert_eq!(
            device.status.attribute("hood", "hoodFanSpeed").unwrap().value,
            json!(1)
        );
    }

    #[tokio::test]
    async fn unknown_fan_option_is_rejected_without_a_command() {
        let (select, fx) = fan_select(hood_device());

        assert!(select.select_option("turbo").await.is_err());
        assert!(fx.commands.calls().is_empty());
    }

    #[test]
    fn lamp_options_pass_through() {
        let (select, _fx) = lamp_select(hood_device());
        assert_eq!(
            select.options().unwrap(),
            vec!["off", "low", "mid", "high"]
        );
        assert_eq!(select.current_option().unwrap(), "mid");
    }

    #[tokio::test]
    async fn selecting_a_lamp_level_sends_the_literal_option() {
        let device = hood_device();
        let (select, fx) = lamp_select(device.clone());

        select.select_option("high").await.unwrap();

        assert_eq!(fx.commands.calls()[0].arguments, vec![json!("high")]);
        assert_eq!(
            device
                .status
                .attribute("hood", "brightnessLevel")
                .unwrap()
                .value,
            json!("high")
        );
    }
}
