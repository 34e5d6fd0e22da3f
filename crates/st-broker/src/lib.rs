//! Device broker for the SmartThings bridge
//!
//! One `DeviceBroker` manages the device/room/scene caches of one installed
//! SmartApp: it routes incoming webhook event batches into the per-device
//! status caches and fans change notifications out to entity adapters
//! through the broker-owned `Dispatcher`. It also owns the periodic
//! refresh-token regeneration that keeps the installation authorized.

mod broker;
mod dispatcher;
mod smartapp;

pub use broker::{DeviceBroker, TOKEN_REFRESH_INTERVAL};
pub use dispatcher::{DeviceIdSet, Dispatcher};
pub use smartapp::SmartAppManager;
