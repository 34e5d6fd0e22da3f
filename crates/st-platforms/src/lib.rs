//! Entity platforms for the SmartThings bridge
//!
//! One module per platform. Each owns a static capability → description
//! table; setup walks every broker-cached device, flattens its capability
//! list, and instantiates one adapter per matching description, bound to
//! {device, capability, description, room}.

pub mod binary_sensor;
pub mod entity;
pub mod event;
pub mod fan;
pub mod light;
pub mod lock;
pub mod percentage;
pub mod select;
pub mod sensor;

#[cfg(test)]
mod testutil;

use std::fmt;

/// The entity platforms this bridge provides
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Platform {
    BinarySensor,
    Event,
    Fan,
    Light,
    Lock,
    Select,
    Sensor,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::BinarySensor => "binary_sensor",
            Platform::Event => "event",
            Platform::Fan => "fan",
            Platform::Light => "light",
            Platform::Lock => "lock",
            Platform::Select => "select",
            Platform::Sensor => "sensor",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordered 'specific to least-specific platform' in order for capabilities
/// to be drawn-down and represented by the most appropriate platform.
pub const PLATFORMS: &[Platform] = &[
    Platform::BinarySensor,
    Platform::Event,
    Platform::Fan,
    Platform::Light,
    Platform::Lock,
    Platform::Select,
    Platform::Sensor,
];
