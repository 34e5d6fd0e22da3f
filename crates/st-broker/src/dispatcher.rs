//! Broker-owned pub/sub signals
//!
//! Two signal channels fan device-change notifications out to entity
//! adapters: one for button presses, one for every other status update.
//! Each emission carries the full set of device ids affected by one webhook
//! batch. Delivery is fire-and-forget in-process broadcast: send errors
//! (no live receivers) are ignored, and a lagged receiver drops the oldest
//! set rather than blocking the broker.

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::trace;

use st_core::DeviceId;

/// The payload of one signal emission: all devices affected by one batch
pub type DeviceIdSet = Arc<HashSet<DeviceId>>;

/// Channel capacity per signal; adapters read promptly, so this only needs
/// to absorb short bursts
const SIGNAL_CHANNEL_CAPACITY: usize = 64;

/// Pub/sub dispatcher owned by one broker
///
/// Adapters subscribe on attach and release the subscription by dropping
/// the returned receiver on detach.
#[derive(Debug)]
pub struct Dispatcher {
    button_tx: broadcast::Sender<DeviceIdSet>,
    update_tx: broadcast::Sender<DeviceIdSet>,
}

impl Dispatcher {
    pub fn new() -> Self {
        let (button_tx, _) = broadcast::channel(SIGNAL_CHANNEL_CAPACITY);
        let (update_tx, _) = broadcast::channel(SIGNAL_CHANNEL_CAPACITY);
        Self {
            button_tx,
            update_tx,
        }
    }

    /// Subscribe to button-press signals
    pub fn subscribe_button(&self) -> broadcast::Receiver<DeviceIdSet> {
        self.button_tx.subscribe()
    }

    /// Subscribe to status-update signals
    pub fn subscribe_update(&self) -> broadcast::Receiver<DeviceIdSet> {
        self.update_tx.subscribe()
    }

    /// Emit a button-press signal for the given devices
    pub fn send_button(&self, devices: HashSet<DeviceId>) {
        trace!(count = devices.len(), "Emitting button signal");
        let _ = self.button_tx.send(Arc::new(devices));
    }

    /// Emit a status-update signal for the given devices
    pub fn send_update(&self, devices: HashSet<DeviceId>) {
        trace!(count = devices.len(), "Emitting update signal");
        let _ = self.update_tx.send(Arc::new(devices));
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}
