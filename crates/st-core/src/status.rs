//! Per-device status cache
//!
//! The cache holds the last known value of every attribute, grouped by
//! component. It is mutated in place by incoming webhook events and by
//! optimistic command results; reads never block. A cached value reflects
//! either the last confirmed event for that attribute or an optimistic local
//! write, whichever arrived most recently.

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::capability::Component;

/// The cached state of one attribute: its value, the unit it was reported
/// in, and any auxiliary data delivered alongside it
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AttributeStatus {
    pub value: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl AttributeStatus {
    /// A status carrying only a value
    pub fn from_value(value: Value) -> Self {
        Self {
            value,
            unit: None,
            data: None,
        }
    }
}

impl From<Value> for AttributeStatus {
    fn from(value: Value) -> Self {
        Self::from_value(value)
    }
}

/// Status cache for one device: component id → attribute key → status
#[derive(Debug, Default)]
pub struct DeviceStatus {
    components: DashMap<String, DashMap<String, AttributeStatus>>,
}

impl DeviceStatus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read one attribute's cached status (cloned snapshot)
    pub fn attribute(&self, component_id: &str, attribute: &str) -> Option<AttributeStatus> {
        self.components
            .get(component_id)
            .and_then(|attrs| attrs.get(attribute).map(|s| s.clone()))
    }

    /// Read an attribute of the `main` component
    pub fn main_attribute(&self, attribute: &str) -> Option<AttributeStatus> {
        self.attribute(Component::Main.as_str(), attribute)
    }

    /// Seed or replace a full attribute record (used when loading the full
    /// device status from the cloud)
    pub fn set_attribute(&self, component_id: &str, attribute: &str, status: AttributeStatus) {
        self.components
            .entry(component_id.to_string())
            .or_default()
            .insert(attribute.to_string(), status);
    }

    /// Apply an authoritative attribute update delivered by an event
    ///
    /// Overwrites the value and auxiliary data; the unit is left from the
    /// last full status fetch (events do not carry one).
    pub fn apply_attribute_update(
        &self,
        component_id: &str,
        attribute: &str,
        value: Value,
        data: Option<Value>,
    ) {
        let attrs = self.components.entry(component_id.to_string()).or_default();
        let mut entry = attrs.entry(attribute.to_string()).or_default();
        entry.value = value;
        entry.data = data;
    }

    /// Optimistically overwrite an attribute's value ahead of the confirming
    /// event, leaving unit and auxiliary data untouched
    pub fn update_attribute_value(&self, component_id: &str, attribute: &str, value: Value) {
        let attrs = self.components.entry(component_id.to_string()).or_default();
        let mut entry = attrs.entry(attribute.to_string()).or_default();
        entry.value = value;
    }

    /// Ids of all components with cached attributes
    pub fn component_ids(&self) -> Vec<String> {
        self.components.iter().map(|c| c.key().clone()).collect()
    }

    /// True if nothing has been cached yet
    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }
}
