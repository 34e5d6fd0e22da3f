//! Webhook event relay
//!
//! The webhook endpoint parses deliveries into `EventBatch`es and hands them
//! to the `SmartAppManager`, which relays them to every connected broker.
//! A broker's subscription is its "incoming event channel": acquired on
//! `connect`, released on `disconnect`. Brokers discard batches addressed
//! to other installed apps themselves, so the relay does no filtering.

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::debug;

use st_core::EventBatch;

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Relay between the webhook endpoint and connected brokers
#[derive(Debug)]
pub struct SmartAppManager {
    events_tx: broadcast::Sender<Arc<EventBatch>>,
}

impl SmartAppManager {
    pub fn new() -> Self {
        let (events_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self { events_tx }
    }

    /// Relay one parsed webhook batch to all connected brokers
    pub fn dispatch(&self, batch: EventBatch) {
        debug!(
            installed_app = %batch.installed_app_id,
            events = batch.events.len(),
            "Dispatching event batch"
        );
        let _ = self.events_tx.send(Arc::new(batch));
    }

    /// Subscribe to incoming event batches
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<EventBatch>> {
        self.events_tx.subscribe()
    }
}

impl Default for SmartAppManager {
    fn default() -> Self {
        Self::new()
    }
}
