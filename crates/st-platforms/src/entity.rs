//! Shared entity adapter state and behavior
//!
//! Every adapter wraps a `SmartThingsEntity`: the device it is bound to, the
//! capability that claimed it, the room it is placed in, and its two seams
//! to the outside — the command dispatcher and the broker's signal
//! dispatcher. Dependencies arrive through the constructor; adapters never
//! reach into ambient state.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use st_api::{ApiError, SmartThings};
use st_broker::Dispatcher;
use st_core::{Attribute, AttributeStatus, Capability, Component, Device, DeviceId, Room};

use crate::Platform;

/// Entity-level failures surfaced to the host
///
/// A missing attribute renders the entity unavailable; a failed command
/// leaves the entity at its last known value.
#[derive(Debug, Error)]
pub enum EntityError {
    #[error("attribute {attribute} missing on component {component} of device {device}")]
    MissingAttribute {
        device: DeviceId,
        component: &'static str,
        attribute: &'static str,
    },

    #[error("attribute {attribute} of device {device} has an unexpected shape")]
    InvalidValue {
        device: DeviceId,
        attribute: &'static str,
    },

    #[error("command failed: {0}")]
    Command(#[from] ApiError),
}

pub type EntityResult<T> = Result<T, EntityError>;

/// Category hint for diagnostic/configuration entities
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityCategory {
    Config,
    Diagnostic,
}

/// Command-dispatch seam between adapters and the cloud client
///
/// Adapters issue commands through this trait so tests can substitute a
/// recording mock for the REST client.
#[async_trait]
pub trait DeviceCommands: Send + Sync {
    async fn execute(
        &self,
        device_id: &DeviceId,
        component_id: &str,
        capability: Capability,
        command: &str,
        arguments: Vec<Value>,
    ) -> Result<(), ApiError>;
}

#[async_trait]
impl DeviceCommands for SmartThings {
    async fn execute(
        &self,
        device_id: &DeviceId,
        component_id: &str,
        capability: Capability,
        command: &str,
        arguments: Vec<Value>,
    ) -> Result<(), ApiError> {
        self.execute_command(device_id, component_id, capability.as_str(), command, arguments)
            .await
    }
}

/// Known products: device name → (manufacturer, model)
const DEVICE_INFO_MAP: &[(&str, (&str, &str))] = &[
    ("Button", ("Aeotec", "GP-AEOBTNUS")),
    ("Dome Leak Sensor", ("Dome", "DMWS1")),
    ("Samsung Microwave", ("Samsung", "MC17T8000CS")),
    (
        "Schlage Touchscreen Deadbolt Door Lock",
        ("Schlage", "BE469NX"),
    ),
    ("SmartThings Button", ("Aeotec", "GP-AEOBTNUS")),
    ("water-battery-tamper", ("Aeotec", "Water Sensor 7")),
    ("water-temp-battery-tempOffset", ("Aeotec", "GP-AEOWLSUS")),
];

/// Attributes about the physical device an entity belongs to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub identifier: DeviceId,
    pub name: String,
    pub manufacturer: String,
    pub model: String,
    pub suggested_area: Option<String>,
    pub configuration_url: &'static str,
}

/// Shared state of one entity adapter
#[derive(Clone)]
pub struct SmartThingsEntity {
    device: Arc<Device>,
    capability: Capability,
    room: Option<Room>,
    commands: Arc<dyn DeviceCommands>,
    dispatcher: Arc<Dispatcher>,
}

impl SmartThingsEntity {
    pub fn new(
        device: Arc<Device>,
        capability: Capability,
        room: Option<Room>,
        commands: Arc<dyn DeviceCommands>,
        dispatcher: Arc<Dispatcher>,
    ) -> Self {
        Self {
            device,
            capability,
            room,
            commands,
            dispatcher,
        }
    }

    pub fn device(&self) -> &Arc<Device> {
        &self.device
    }

    pub fn device_id(&self) -> &DeviceId {
        &self.device.device_id
    }

    pub fn capability(&self) -> Capability {
        self.capability
    }

    /// Entity display name: the device label, suffixed by the description
    /// name when one is set
    pub fn name(&self, description_name: Option<&str>) -> String {
        match description_name {
            Some(suffix) => format!("{} {}", self.device.label, suffix),
            None => self.device.label.clone(),
        }
    }

    /// Stable unique id: `{device_id}-{platform}-{attribute}`
    pub fn unique_id(&self, platform: Platform, key: Attribute) -> String {
        format!("{}-{}-{}", self.device.device_id, platform, key)
    }

    /// Get attributes about the device
    pub fn device_info(&self) -> DeviceInfo {
        let (manufacturer, model) = DEVICE_INFO_MAP
            .iter()
            .find(|(name, _)| *name == self.device.name)
            .map(|(_, info)| *info)
            .unwrap_or(("Unknown", self.device.name.as_str()));

        DeviceInfo {
            identifier: self.device.device_id.clone(),
            name: self.device.label.clone(),
            manufacturer: manufacturer.to_string(),
            model: model.to_string(),
            suggested_area: self.room.as_ref().map(|r| r.name.clone()),
            configuration_url: "https://account.smartthings.com",
        }
    }

    /// Read one cached attribute, surfacing a lookup failure when absent
    pub fn attribute(&self, component: Component, key: Attribute) -> EntityResult<AttributeStatus> {
        self.device
            .status
            .attribute(component.as_str(), key.as_str())
            .ok_or(EntityError::MissingAttribute {
                device: self.device.device_id.clone(),
                component: component.as_str(),
                attribute: key.as_str(),
            })
    }

    /// Issue a command and optimistically apply its result
    ///
    /// On success the local status cache is overwritten ahead of the
    /// confirming push update and an update signal is emitted immediately so
    /// the host re-renders. The optimistic value may later lose to a
    /// delayed authoritative event; last write wins. On failure nothing is
    /// written and the error propagates.
    pub async fn command_with_update(
        &self,
        component: Component,
        command: &'static str,
        arguments: Vec<Value>,
        key: Attribute,
        optimistic_value: Value,
    ) -> EntityResult<()> {
        self.commands
            .execute(
                &self.device.device_id,
                component.as_str(),
                self.capability,
                command,
                arguments,
            )
            .await?;

        self.device.status.update_attribute_value(
            component.as_str(),
            key.as_str(),
            optimistic_value,
        );
        debug!(
            device = %self.device.device_id,
            component = %component,
            command,
            "Command accepted; state written optimistically"
        );

        let mut affected = HashSet::new();
        affected.insert(self.device.device_id.clone());
        self.dispatcher.send_update(affected);
        Ok(())
    }
}
