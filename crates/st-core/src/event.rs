//! Webhook event-batch model
//!
//! One webhook delivery carries a batch of events for one installed
//! application instance. Events are transient: consumed once, never
//! persisted; each causes at most one status-cache mutation.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::capability::{Attribute, Capability};
use crate::ids::{DeviceId, InstalledAppId, LocationId};

/// Kind of an event inside a webhook delivery
///
/// Only device events are routed to the status cache; everything else is
/// skipped by the broker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventType {
    #[serde(rename = "DEVICE_EVENT")]
    DeviceEvent,
    #[serde(rename = "DEVICE_LIFECYCLE_EVENT")]
    DeviceLifecycleEvent,
    #[serde(rename = "TIMER_EVENT")]
    TimerEvent,
    #[serde(other, rename = "UNKNOWN")]
    Unknown,
}

/// One attribute update reported by the cloud
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceEvent {
    pub event_type: EventType,
    pub device_id: DeviceId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location_id: Option<LocationId>,
    pub component_id: String,
    pub capability: String,
    pub attribute: String,
    pub value: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl DeviceEvent {
    /// True for a button-press event (button capability, button attribute)
    pub fn is_button_press(&self) -> bool {
        self.capability == Capability::Button.as_str()
            && self.attribute == Attribute::Button.as_str()
    }
}

/// A batch of events delivered by one webhook call
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventBatch {
    pub installed_app_id: InstalledAppId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location_id: Option<LocationId>,
    pub events: Vec<DeviceEvent>,
}
