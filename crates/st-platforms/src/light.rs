//! Light entities
//!
//! The hood lamp models brightness as an ordered enumeration of named
//! levels. The 0-255 host brightness scale converts through the count of
//! non-"off" levels; turning off issues the literal "off" level.

use std::sync::Arc;

use serde_json::json;

use st_broker::DeviceBroker;
use st_core::{Attribute, Capability, Component, DeviceId};

use crate::entity::{
    DeviceCommands, DeviceInfo, EntityError, EntityResult, SmartThingsEntity,
};
use crate::percentage::{ordered_list_item_to_percentage, percentage_to_ordered_list_item};
use crate::Platform;

const LEVEL_OFF: &str = "off";

/// Describes one light entity derived from a capability
#[derive(Debug, Clone, Copy)]
pub struct LightDescription {
    pub key: Attribute,
    pub name: &'static str,
    pub component: Component,
}

pub const LIGHT_DESCRIPTIONS: &[(Capability, &[LightDescription])] = &[(
    Capability::Lamp,
    &[LightDescription {
        key: Attribute::BrightnessLevel,
        name: "Light",
        component: Component::Hood,
    }],
)];

fn descriptions_for(capability: Capability) -> Option<&'static [LightDescription]> {
    LIGHT_DESCRIPTIONS
        .iter()
        .find(|(c, _)| *c == capability)
        .map(|(_, d)| *d)
}

/// Add light entities for a config entry's broker
pub fn setup_entry(
    broker: &DeviceBroker,
    commands: &Arc<dyn DeviceCommands>,
) -> Vec<SmartThingsLight> {
    let mut entities = Vec::new();
    for device in broker.devices() {
        let room = broker.room_for(&device);
        for capability in broker.get_capabilities(&device) {
            if let Some(descriptions) = descriptions_for(capability) {
                for description in descriptions {
                    entities.push(SmartThingsLight::new(
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

/// A SmartThings light entity
pub struct SmartThingsLight {
    entity: SmartThingsEntity,
    description: &'static LightDescription,
}

impl SmartThingsLight {
    pub fn new(entity: SmartThingsEntity, description: &'static LightDescription) -> Self {
        Self {
            entity,
            description,
        }
    }

    pub fn name(&self) -> String {
        self.entity.name(Some(self.description.name))
    }

    pub fn unique_id(&self) -> String {
        self.entity.unique_id(Platform::Light, self.description.key)
    }

    pub fn device_info(&self) -> DeviceInfo {
        self.entity.device_info()
    }

    pub fn device_id(&self) -> &DeviceId {
        self.entity.device_id()
    }

    fn brightness_level(&self) -> EntityResult<String> {
        let status = self.entity.attribute(self.description.component, self.description.key)?;
        status
            .value
            .as_str()
            .map(str::to_string)
            .ok_or(EntityError::InvalidValue {
                device: self.entity.device_id().clone(),
                attribute: self.description.key.as_str(),
            })
    }

    /// Valid brightness levels, "off" excluded from the scale
    fn brightness_levels(&self) -> EntityResult<Vec<String>> {
        let status = self
            .entity
            .attribute(self.description.component, Attribute::SupportedBrightnessLevel)?;
        status
            .value
            .as_array()
            .map(|levels| {
                levels
                    .iter()
                    .filter_map(|level| level.as_str())
                    .filter(|level| *level != LEVEL_OFF)
                    .map(str::to_string)
                    .collect()
            })
            .ok_or(EntityError::InvalidValue {
                device: self.entity.device_id().clone(),
                attribute: Attribute::SupportedBrightnessLevel.as_str(),
            })
    }

    /// Return true if light is on
    pub fn is_on(&self) -> EntityResult<bool> {
        Ok(self.brightness_level()? != LEVEL_OFF)
    }

    /// Return the brightness of this light between 0..255
    pub fn brightness(&self) -> EntityResult<u8> {
        let level = self.brightness_level()?;
        if level == LEVEL_OFF {
            return Ok(0);
        }
        let levels = self.brightness_levels()?;
        let percentage = ordered_list_item_to_percentage(&levels, &level).ok_or(
            EntityError::InvalidValue {
                device: self.entity.device_id().clone(),
                attribute: self.description.key.as_str(),
            },
        )?;
        Ok((percentage * 255 / 100) as u8)
    }

    /// Share of the 0-100 scale each level covers
    pub fn percentage_step(&self) -> EntityResult<f64> {
        let levels = self.brightness_levels()?;
        Ok(100.0 / levels.len() as f64)
    }

    /// Turn the entity on, mapping 0-255 brightness to a named level
    pub async fn turn_on(&self, brightness: Option<u8>) -> EntityResult<()> {
        let levels = self.brightness_levels()?;
        let percentage = i64::from(brightness.unwrap_or(255)) * 100 / 255;
        let level = percentage_to_ordered_list_item(&levels, percentage)
            .cloned()
            .ok_or(EntityError::InvalidValue {
                device: self.entity.device_id().clone(),
                attribute: Attribute::SupportedBrightnessLevel.as_str(),
            })?;
        self.set_brightness_level(level).await
    }

    /// Turn the entity off
    pub async fn turn_off(&self) -> EntityResult<()> {
        self.set_brightness_level(LEVEL_OFF.to_string()).await
    }

    async fn set_brightness_level(&self, level: String) -> EntityResult<()> {
        self.entity
            .command_with_update(
                self.description.component,
                "setBrightnessLevel",
                vec![json!(level)],
                self.description.key,
                json!(level),
            )
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::entity_for;
    use st_core::Device;

    fn lamp_device(level: &str) -> Arc<Device> {
        let device = Device::new("d1".into(), "Samsung Microwave", "Microwave")
            .with_component("hood", vec![Capability::Lamp]);
        device
            .status
            .set_attribute("hood", "brightnessLevel", json!(level).into());
        device.status.set_attribute(
            "hood",
            "supportedBrightnessLevel",
            json!(["off", "low", "mid", "high"]).into(),
        );
        Arc::new(device)
    }

    fn light_for(device: Arc<Device>) -> (SmartThingsLight, crate::testutil::EntityFixture) {
        let fx = entity_for(Arc::clone(&device), Capability::Lamp, None);
        let light = SmartThingsLight::new(fx.entity.clone(), &LIGHT_DESCRIPTIONS[0].1[0]);
        (light, fx)
    }

    #[tokio::test]
    async fn off_then_brightness_reads_zero() {
        let device = lamp_device("high");
        let (light, fx) = light_for(device.clone());

        light.turn_off().await.unwrap();

        assert_eq!(fx.commands.calls()[0].arguments, vec![json!("off")]);
        assert_eq!(light.brightness().unwrap(), 0);
        assert!(!light.is_on().unwrap());
    }

    #[tokio::test]
    async fn highest_level_reads_full_brightness() {
        let device = lamp_device("off");
        let (light, _fx) = light_for(device.clone());

        light.turn_on(Some(255)).await.unwrap();

        assert_eq!(
            device
                .status
                .attribute("hood", "brightnessLevel")
                .unwrap()
                .value,
            json!("high")
        );
        assert_eq!(light.brightness().unwrap(), 255);
        assert!(light.is_on().unwrap());
    }

    #[tokio::test]
    async fn default_brightness_is_maximum() {
        let device = lamp_device("off");
        let (light, fx) = light_for(device);

        light.turn_on(None).await.unwrap();

        assert_eq!(fx.commands.calls()[0].arguments, vec![json!("high")]);
    }

    #[tokio::test]
    async fn low_brightness_maps_to_first_level() {
        let device = lamp_device("off");
        let (light, fx) = light_for(device);

        // 64/255 ≈ 25% falls inside the first of three levels.
        light.turn_on(Some(64)).await.unwrap();

        assert_eq!(fx.commands.calls()[0].arguments, vec![json!("low")]);
    }

    #[test]
    fn intermediate_level_discretizes() {
        let device = lamp_device("low");
        let (light, _fx) = light_for(device);

        // "low" is 1 of 3 levels: 33% of 255.
        assert_eq!(light.brightness().unwrap(), 84);
        assert_eq!(light.percentage_step().unwrap(), 100.0 / 3.0);
    }
}
