//! Capability, attribute, and component vocabulary
//!
//! SmartThings models a device as a set of capabilities, each exposing named
//! attributes, optionally grouped into named sub-components. The API speaks
//! raw strings; this module pins down the vocabulary the bridge understands.
//! Capabilities outside this vocabulary still flow through the status cache
//! (it is attribute-keyed) but never produce entities.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A device capability known to the bridge
///
/// Stock capabilities use their plain API id; Samsung appliance extensions
/// carry the `samsungce.` namespace prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum Capability {
    Battery,
    Button,
    DoorState,
    HealthCheck,
    HoodFanSpeed,
    Lamp,
    Lock,
    OvenMode,
    OvenOperatingState,
    OvenSetpoint,
    TamperAlert,
    TemperatureMeasurement,
    WaterSensor,
}

impl Capability {
    /// The capability id as it appears on the wire
    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::Battery => "battery",
            Capability::Button => "button",
            Capability::DoorState => "samsungce.doorState",
            Capability::HealthCheck => "healthCheck",
            Capability::HoodFanSpeed => "samsungce.hoodFanSpeed",
            Capability::Lamp => "samsungce.lamp",
            Capability::Lock => "lock",
            Capability::OvenMode => "ovenMode",
            Capability::OvenOperatingState => "ovenOperatingState",
            Capability::OvenSetpoint => "ovenSetpoint",
            Capability::TamperAlert => "tamperAlert",
            Capability::TemperatureMeasurement => "temperatureMeasurement",
            Capability::WaterSensor => "waterSensor",
        }
    }

    /// Parse a wire capability id, `None` for ids outside the vocabulary
    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "battery" => Capability::Battery,
            "button" => Capability::Button,
            "samsungce.doorState" => Capability::DoorState,
            "healthCheck" => Capability::HealthCheck,
            "samsungce.hoodFanSpeed" => Capability::HoodFanSpeed,
            "samsungce.lamp" => Capability::Lamp,
            "lock" => Capability::Lock,
            "ovenMode" => Capability::OvenMode,
            "ovenOperatingState" => Capability::OvenOperatingState,
            "ovenSetpoint" => Capability::OvenSetpoint,
            "tamperAlert" => Capability::TamperAlert,
            "temperatureMeasurement" => Capability::TemperatureMeasurement,
            "waterSensor" => Capability::WaterSensor,
            _ => return None,
        })
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<Capability> for String {
    fn from(c: Capability) -> Self {
        c.as_str().to_string()
    }
}

impl TryFrom<String> for Capability {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Capability::parse(&s).ok_or(s)
    }
}

/// An attribute key within a capability
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Attribute {
    Battery,
    BrightnessLevel,
    Button,
    CompletionTime,
    DoorState,
    HoodFanSpeed,
    Lock,
    LockCodes,
    MachineState,
    MaxFanSpeed,
    MinFanSpeed,
    OvenJobState,
    OvenMode,
    OvenSetpoint,
    SupportedBrightnessLevel,
    SupportedHoodFanSpeed,
    Tamper,
    Temperature,
    Water,
}

impl Attribute {
    /// The attribute key as it appears on the wire
    pub fn as_str(&self) -> &'static str {
        match self {
            Attribute::Battery => "battery",
            Attribute::BrightnessLevel => "brightnessLevel",
            Attribute::Button => "button",
            Attribute::CompletionTime => "completionTime",
            Attribute::DoorState => "doorState",
            Attribute::HoodFanSpeed => "hoodFanSpeed",
            Attribute::Lock => "lock",
            Attribute::LockCodes => "lockCodes",
            Attribute::MachineState => "machineState",
            Attribute::MaxFanSpeed => "settableMaxFanSpeed",
            Attribute::MinFanSpeed => "settableMinFanSpeed",
            Attribute::OvenJobState => "ovenJobState",
            Attribute::OvenMode => "ovenMode",
            Attribute::OvenSetpoint => "ovenSetpoint",
            Attribute::SupportedBrightnessLevel => "supportedBrightnessLevel",
            Attribute::SupportedHoodFanSpeed => "supportedHoodFanSpeed",
            Attribute::Tamper => "tamper",
            Attribute::Temperature => "temperature",
            Attribute::Water => "water",
        }
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named sub-unit of a device with its own attribute set
///
/// Every device has a `main` component; multi-component appliances add named
/// ones (the integrated hood on Samsung ranges is the one this bridge
/// addresses).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Component {
    #[default]
    Main,
    Hood,
}

impl Component {
    /// The component id as it appears on the wire
    pub fn as_str(&self) -> &'static str {
        match self {
            Component::Main => "main",
            Component::Hood => "hood",
        }
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capability_round_trip() {
        for cap in [
            Capability::Battery,
            Capability::DoorState,
            Capability::HoodFanSpeed,
            Capability::TemperatureMeasurement,
        ] {
            assert_eq!(Capability::parse(cap.as_str()), Some(cap));
        }
    }

    #[test]
    fn unknown_capability_is_none() {
        assert_eq!(Capability::parse("switchLevel"), None);
        assert_eq!(Capability::parse(""), None);
    }

    #[test]
    fn namespaced_ids_survive_serde() {
        let json = serde_json::to_string(&Capability::Lamp).unwrap();
        assert_eq!(json, "\"samsungce.lamp\"");
        let back: Capability = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Capability::Lamp);
    }
}
