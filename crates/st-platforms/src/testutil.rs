//! Shared test helpers for the platform modules

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;

use st_api::{ApiError, StatusCode};
use st_broker::Dispatcher;
use st_core::{Capability, Device, DeviceId, Room};

use crate::entity::{DeviceCommands, SmartThingsEntity};

#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCommand {
    pub device_id: DeviceId,
    pub component_id: String,
    pub capability: Capability,
    pub command: String,
    pub arguments: Vec<Value>,
}

/// Recording stand-in for the REST client's command path
#[derive(Default)]
pub struct MockCommands {
    calls: Mutex<Vec<RecordedCommand>>,
    fail: AtomicBool,
}

impl MockCommands {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_next(&self) {
        self.fail.store(true, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<RecordedCommand> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl DeviceCommands for MockCommands {
    async fn execute(
        &self,
        device_id: &DeviceId,
        component_id: &str,
        capability: Capability,
        command: &str,
        arguments: Vec<Value>,
    ) -> Result<(), ApiError> {
        if self.fail.swap(false, Ordering::SeqCst) {
            return Err(ApiError::Status {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                endpoint: format!("/devices/{device_id}/commands"),
            });
        }
        self.calls.lock().unwrap().push(RecordedCommand {
            device_id: device_id.clone(),
            component_id: component_id.to_string(),
            capability,
            command: command.to_string(),
            arguments,
        });
        Ok(())
    }
}

pub struct EntityFixture {
    pub entity: SmartThingsEntity,
    pub commands: Arc<MockCommands>,
    pub dispatcher: Arc<Dispatcher>,
}

/// Build an entity bound to the given device and capability, with a mock
/// command seam and a fresh dispatcher
pub fn entity_for(device: Arc<Device>, capability: Capability, room: Option<Room>) -> EntityFixture {
    let commands = MockCommands::new();
    let dispatcher = Arc::new(Dispatcher::new());
    let entity = SmartThingsEntity::new(
        device,
        capability,
        room,
        commands.clone(),
        dispatcher.clone(),
    );
    EntityFixture {
        entity,
        commands,
        dispatcher,
    }
}
