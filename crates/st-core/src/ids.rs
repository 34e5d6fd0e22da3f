//! Opaque identifier newtypes for SmartThings API objects
//!
//! SmartThings ids are opaque strings (UUIDs in practice). Wrapping them
//! keeps the maps in the broker and registries from mixing up id spaces.

use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! id_type {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create a new id from a string
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Get the id as a string slice
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self::new(s)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }
    };
}

id_type!(
    /// Identifier of a physical or virtual device
    DeviceId
);
id_type!(
    /// Identifier of a room within a location
    RoomId
);
id_type!(
    /// Identifier of a scene within a location
    SceneId
);
id_type!(
    /// Identifier of a SmartThings location
    LocationId
);
id_type!(
    /// Identifier of one installed application instance (one authorized
    /// binding between the app and a location's device set)
    InstalledAppId
);
id_type!(
    /// Identifier of the parent SmartApp
    AppId
);
