//! Wire DTOs for the SmartThings API
//!
//! The API speaks camelCase JSON with paged `items` envelopes. DTOs are
//! converted into `st-core` records at the client boundary; capabilities
//! outside the bridge vocabulary are dropped there with a trace log.

use std::collections::HashMap;

use serde::Deserialize;
use tracing::trace;

use st_core::{
    AppId, AttributeStatus, Capability, Component, Device, DeviceId, InstalledAppId, LocationId,
    Room, RoomId, Scene, SceneId,
};

/// Paged list envelope
#[derive(Debug, Deserialize)]
pub(crate) struct PagedItems<T> {
    pub items: Vec<T>,
}

/// The parent SmartApp
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct App {
    pub app_id: AppId,
    pub app_name: String,
    #[serde(default)]
    pub display_name: Option<String>,
}

/// One authorized installation of the app at a location
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstalledApp {
    pub installed_app_id: InstalledAppId,
    pub location_id: LocationId,
    #[serde(default)]
    pub installed_app_status: Option<String>,
}

impl InstalledApp {
    /// True when the installation is authorized to deliver events
    pub fn is_authorized(&self) -> bool {
        self.installed_app_status.as_deref() == Some("AUTHORIZED")
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct DeviceDto {
    pub device_id: DeviceId,
    pub name: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub room_id: Option<RoomId>,
    #[serde(default)]
    pub components: Vec<ComponentDto>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ComponentDto {
    pub id: String,
    #[serde(default)]
    pub capabilities: Vec<CapabilityRef>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CapabilityRef {
    pub id: String,
}

impl DeviceDto {
    pub fn into_device(self) -> Device {
        let label = self.label.unwrap_or_else(|| self.name.clone());
        let mut device = Device::new(self.device_id, self.name, label);
        device.room_id = self.room_id;

        for component in self.components {
            let capabilities = parse_capabilities(&component.capabilities);
            if component.id == Component::Main.as_str() {
                device.capabilities = capabilities;
            } else {
                device.components.insert(component.id, capabilities);
            }
        }

        device
    }
}

fn parse_capabilities(refs: &[CapabilityRef]) -> Vec<Capability> {
    refs.iter()
        .filter_map(|c| {
            let parsed = Capability::parse(&c.id);
            if parsed.is_none() {
                trace!(capability = %c.id, "Skipping capability outside the bridge vocabulary");
            }
            parsed
        })
        .collect()
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RoomDto {
    pub room_id: RoomId,
    #[serde(default)]
    pub location_id: Option<LocationId>,
    pub name: String,
}

impl RoomDto {
    pub fn into_room(self) -> Room {
        Room {
            room_id: self.room_id,
            location_id: self.location_id,
            name: self.name,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SceneDto {
    pub scene_id: SceneId,
    pub scene_name: String,
}

impl SceneDto {
    pub fn into_scene(self) -> Scene {
        Scene {
            scene_id: self.scene_id,
            name: self.scene_name,
        }
    }
}

/// Full device status: component → capability → attribute → status
///
/// The capability level is flattened away when applied to the cache, which
/// is component/attribute keyed.
#[derive(Debug, Deserialize)]
pub(crate) struct DeviceStatusDto {
    #[serde(default)]
    pub components: HashMap<String, HashMap<String, HashMap<String, AttributeStatus>>>,
}
