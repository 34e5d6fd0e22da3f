//! Device, room, and scene records
//!
//! Devices are owned by the broker for the lifetime of one configured
//! installation and carry their own mutable status cache. Rooms and scenes
//! are immutable snapshots fetched once at setup.

use indexmap::IndexMap;

use crate::capability::Capability;
use crate::ids::{DeviceId, LocationId, RoomId, SceneId};
use crate::status::DeviceStatus;

/// One SmartThings device
///
/// `capabilities` are the root (`main`) component's capabilities;
/// `components` maps each named sub-component to its own capability list,
/// preserving the order the API reported them in.
#[derive(Debug)]
pub struct Device {
    pub device_id: DeviceId,
    /// Product name as reported by the vendor
    pub name: String,
    /// User-assigned label
    pub label: String,
    pub room_id: Option<RoomId>,
    pub capabilities: Vec<Capability>,
    pub components: IndexMap<String, Vec<Capability>>,
    pub status: DeviceStatus,
}

impl Device {
    pub fn new(
        device_id: DeviceId,
        name: impl Into<String>,
        label: impl Into<String>,
    ) -> Self {
        Self {
            device_id,
            name: name.into(),
            label: label.into(),
            room_id: None,
            capabilities: Vec::new(),
            components: IndexMap::new(),
            status: DeviceStatus::new(),
        }
    }

    pub fn with_room(mut self, room_id: RoomId) -> Self {
        self.room_id = Some(room_id);
        self
    }

    pub fn with_capabilities(mut self, capabilities: Vec<Capability>) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Add a named component with its capabilities (insertion order kept)
    pub fn with_component(
        mut self,
        component_id: impl Into<String>,
        capabilities: Vec<Capability>,
    ) -> Self {
        self.components.insert(component_id.into(), capabilities);
        self
    }
}

/// A room within a location; used only to enrich entity placement metadata
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Room {
    pub room_id: RoomId,
    pub location_id: Option<LocationId>,
    pub name: String,
}

/// A scene within a location; cached but not used by the event path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scene {
    pub scene_id: SceneId,
    pub name: String,
}
