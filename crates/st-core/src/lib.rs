//! Core types for the SmartThings bridge
//!
//! This crate provides the fundamental types shared by the cloud client,
//! the device broker, and the entity platforms: opaque identifiers, the
//! capability/attribute vocabulary, device/room/scene records, the
//! per-device status cache, and the webhook event-batch model.

mod capability;
mod device;
mod event;
mod ids;
mod status;

pub use capability::{Attribute, Capability, Component};
pub use device::{Device, Room, Scene};
pub use event::{DeviceEvent, EventBatch, EventType};
pub use ids::{AppId, DeviceId, InstalledAppId, LocationId, RoomId, SceneId};
pub use status::{AttributeStatus, DeviceStatus};
