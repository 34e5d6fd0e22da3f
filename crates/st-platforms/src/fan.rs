//! Fan entities
//!
//! The exhaust fan of a hood component exposes a discrete integer speed.
//! Percentages are converted against the device-advertised valid speed set:
//! speeds strictly greater than the advertised minimum and at most the
//! advertised maximum.

use std::sync::Arc;

use serde_json::json;

use st_broker::DeviceBroker;
use st_core::{Attribute, Capability, Component, DeviceId};

use crate::entity::{
    DeviceCommands, DeviceInfo, EntityError, EntityResult, SmartThingsEntity,
};
use crate::percentage::{
    int_states_in_range, percentage_to_ranged_value, ranged_value_to_percentage,
};
use crate::Platform;

/// Describes one fan entity derived from a capability
#[derive(Debug, Clone, Copy)]
pub struct FanDescription {
    pub key: Attribute,
    pub name: &'static str,
    pub component: Component,
}

pub const FAN_DESCRIPTIONS: &[(Capability, &[FanDescription])] = &[(
    Capability::HoodFanSpeed,
    &[FanDescription {
        key: Attribute::HoodFanSpeed,
        name: "Exhaust Fan",
        component: Component::Hood,
    }],
)];

fn descriptions_for(capability: Capability) -> Option<&'static [FanDescription]> {
    FAN_DESCRIPTIONS
        .iter()
        .find(|(c, _)| *c == capability)
        .map(|(_, d)| *d)
}

/// Add fan entities for a config entry's broker
pub fn setup_entry(
    broker: &DeviceBroker,
    commands: &Arc<dyn DeviceCommands>,
) -> Vec<SmartThingsFan> {
    let mut entities = Vec::new();
    for device in broker.devices() {
        let room = broker.room_for(&device);
        for capability in broker.get_capabilities(&device) {
            if let Some(descriptions) = descriptions_for(capability) {
                for description in descriptions {
                    entities.push(SmartThingsFan::new(
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

/// A SmartThings fan entity
pub struct SmartThingsFan {
    entity: SmartThingsEntity,
    description: &'static FanDescription,
}

impl SmartThingsFan {
    pub fn new(entity: SmartThingsEntity, description: &'static FanDescription) -> Self {
        Self {
            entity,
            description,
        }
    }

    pub fn name(&self) -> String {
        self.entity.name(Some(self.description.name))
    }

    pub fn unique_id(&self) -> String {
        self.entity.unique_id(Platform::Fan, self.description.key)
    }

    pub fn device_info(&self) -> DeviceInfo {
        self.entity.device_info()
    }

    pub fn device_id(&self) -> &DeviceId {
        self.entity.device_id()
    }

    fn int_attribute(&self, key: Attribute) -> EntityResult<i64> {
        let status = self.entity.attribute(self.description.component, key)?;
        status.value.as_i64().ok_or(EntityError::InvalidValue {
            device: self.entity.device_id().clone(),
            attribute: key.as_str(),
        })
    }

    fn speed(&self) -> EntityResult<i64> {
        self.int_attribute(self.description.key)
    }

    /// Valid speeds: advertised set filtered to (min, max]
    fn speed_list(&self) -> EntityResult<Vec<i64>> {
        let status = self
            .entity
            .attribute(self.description.component, Attribute::SupportedHoodFanSpeed)?;
        let supported: Vec<i64> = status
            .value
            .as_array()
            .map(|values| values.iter().filter_map(|v| v.as_i64()).collect())
            .ok_or(EntityError::InvalidValue {
                device: self.entity.device_id().clone(),
                attribute: Attribute::SupportedHoodFanSpeed.as_str(),
            })?;
        let min_speed = self.int_attribute(Attribute::MinFanSpeed)?;
        let max_speed = self.int_attribute(Attribute::MaxFanSpeed)?;

        Ok(supported
            .into_iter()
            .filter(|speed| *speed > min_speed && *speed <= max_speed)
            .collect())
    }

    fn speed_range(&self) -> EntityResult<(i64, i64)> {
        let speeds = self.speed_list()?;
        match (speeds.iter().min(), speeds.iter().max()) {
            (Some(low), Some(high)) => Ok((*low, *high)),
            _ => Err(EntityError::InvalidValue {
                device: self.entity.device_id().clone(),
                attribute: Attribute::SupportedHoodFanSpeed.as_str(),
            }),
        }
    }

    /// Return true if fan is on
    pub fn is_on(&self) -> EntityResult<bool> {
        Ok(self.speed()? != 0)
    }

    /// Return the current speed percentage
    pub fn percentage(&self) -> EntityResult<i64> {
        Ok(ranged_value_to_percentage(self.speed_range()?, self.speed()?))
    }

    /// Return the number of speeds the fan supports
    pub fn speed_count(&self) -> EntityResult<i64> {
        Ok(int_states_in_range(self.speed_range()?))
    }

    /// Set the speed percentage of the fan
    ///
    /// `None` means "maximum available speed"; 0 forces the fan off; other
    /// percentages round up against the advertised range.
    pub async fn set_percentage(&self, percentage: Option<i64>) -> EntityResult<()> {
        let speed = match percentage {
            None => self.speed_range()?.1,
            Some(0) => 0,
            Some(pct) => percentage_to_ranged_value(self.speed_range()?, pct).ceil() as i64,
        };
        self.entity
            .command_with_update(
                self.description.component,
                "setHoodFanSpeed",
                vec![json!(speed)],
                self.description.key,
                json!(speed),
            )
            .await
    }

    /// Turn the fan on
    pub async fn turn_on(&self, percentage: Option<i64>) -> EntityResult<()> {
        self.set_percentage(percentage).await
    }

    /// Turn the fan off
    pub async fn turn_off(&self) -> EntityResult<()> {
        self.set_percentage(Some(0)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::entity_for;
    use st_core::Device;

    fn hood_device(speed: i64) -> Arc<Device> {
        let device = Device::new("d1".into(), "Samsung Microwave", "Microwave")
            .with_component("hood", vec![Capability::HoodFanSpeed]);
        device
            .status
            .set_attribute("hood", "hoodFanSpeed", json!(speed).into());
        device.status.set_attribute(
            "hood",
            "supportedHoodFanSpeed",
            json!([0, 1, 2, 3, 4]).into(),
        );
        device
            .status
            .set_attribute("hood", "settableMinFanSpeed", json!(0).into());
        device
            .status
            .set_attribute("hood", "settableMaxFanSpeed", json!(4).into());
        Arc::new(device)
    }

    fn fan_for(device: Arc<Device>) -> (SmartThingsFan, crate::testutil::EntityFixture) {
        let fx = entity_for(Arc::clone(&device), Capability::HoodFanSpeed, None);
        let fan = SmartThingsFan::new(fx.entity.clone(), &FAN_DESCRIPTIONS[0].1[0]);
        (fan, fx)
    }

    #[tokio::test]
    async fn zero_percentage_forces_speed_zero() {
        let device = hood_device(2);
        let (fan, fx) = fan_for(device);

        fan.set_percentage(Some(0)).await.unwrap();

        let calls = fx.commands.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].command, "setHoodFanSpeed");
        assert_eq!(calls[0].arguments, vec![json!(0)]);
        assert_eq!(calls[0].component_id, "hood");
    }

    #[tokio::test]
    async fn null_percentage_means_maximum_speed() {
        let device = hood_device(1);
        let (fan, fx) = fan_for(device);

        fan.set_percentage(None).await.unwrap();

        assert_eq!(fx.commands.calls()[0].arguments, vec![json!(4)]);
    }

    #[tokio::test]
    async fn fifty_percent_rounds_up_against_the_range() {
        let device = hood_device(1);
        let (fan, fx) = fan_for(device);

        fan.set_percentage(Some(50)).await.unwrap();

        assert_eq!(fx.commands.calls()[0].arguments, vec![json!(2)]);
    }

    #[tokio::test]
    async fn successful_command_updates_cache_and_signals() {
        let device = hood_device(1);
        let (fan, fx) = fan_for(device.clone());
        let mut updates = fx.dispatcher.subscribe_update();

        fan.set_percentage(None).await.unwrap();

        assert_eq!(
            device.status.attribute("hood", "hoodFanSpeed").unwrap().value,
            json!(4)
        );
        let set = updates.try_recv().unwrap();
        assert!(set.contains(&DeviceId::from("d1")));
    }

    #[tokio::test]
    async fn failed_command_leaves_cache_untouched() {
        let device = hood_device(1);
        let (fan, fx) = fan_for(device.clone());
        let mut updates = fx.dispatcher.subscribe_update();

        fx.commands.fail_next();
        assert!(fan.set_percentage(None).await.is_err());

        assert_eq!(
            device.status.attribute("hood", "hoodFanSpeed").unwrap().value,
            json!(1)
        );
        assert!(updates.try_recv().is_err());
    }

    #[test]
    fn state_properties_follow_the_advertised_range() {
        let device = hood_device(2);
        let (fan, _fx) = fan_for(device);

        assert!(fan.is_on().unwrap());
        // Advertised 0-4 with min 0 filters to {1,2,3,4}.
        assert_eq!(fan.speed_count().unwrap(), 4);
        assert_eq!(fan.percentage().unwrap(), 50);
    }

    #[test]
    fn off_fan_reports_zero_percentage() {
        let device = hood_device(0);
        let (fan, _fx) = fan_for(device);

        assert!(!fan.is_on().unwrap());
        assert_eq!(fan.percentage().unwrap(), 0);
    }
}
