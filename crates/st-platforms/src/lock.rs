//! Lock entities
//!
//! Locks surface lock/unlock control, who last operated the lock, and a set
//! of diagnostic attributes carried in event auxiliary data. The vendor's
//! lock-code table arrives as pseudo-JSON text and goes through a dedicated
//! decoder.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{json, Value};
use tracing::debug;

use st_broker::DeviceBroker;
use st_core::{Attribute, Capability, Component, DeviceId};

use crate::entity::{DeviceCommands, DeviceInfo, EntityResult, SmartThingsEntity};
use crate::Platform;

/// Auxiliary-data keys surfaced as diagnostic attributes, wire name →
/// attribute name
const LOCK_ATTR_MAP: &[(&str, &str)] = &[
    ("codeId", "code_id"),
    ("codeName", "code_name"),
    ("lockName", "lock_name"),
    ("method", "method"),
    ("timeout", "timeout"),
    ("usedCode", "used_code"),
];

/// Describes one lock entity derived from a capability
#[derive(Debug, Clone, Copy)]
pub struct LockDescription {
    pub key: Attribute,
    /// Locks carry no name suffix; the entity takes the device label
    pub name: Option<&'static str>,
}

pub const LOCK_DESCRIPTIONS: &[(Capability, &[LockDescription])] = &[(
    Capability::Lock,
    &[LockDescription {
        key: Attribute::Lock,
        name: None,
    }],
)];

fn descriptions_for(capability: Capability) -> Option<&'static [LockDescription]> {
    LOCK_DESCRIPTIONS
        .iter()
        .find(|(c, _)| *c == capability)
        .map(|(_, d)| *d)
}

/// Decode the vendor's lock-code table
///
/// The lockCodes attribute value is a JSON object re-encoded as a string,
/// frequently with stray backslash escaping left in (`{\"1\":\"Guest\"}`).
/// Backslashes are stripped before parsing. Malformed input decodes to an
/// empty table rather than failing the entity.
pub fn decode_lock_codes(raw: &str) -> HashMap<String, String> {
    let cleaned = raw.replace('\\', "");
    match serde_json::from_str(&cleaned) {
        Ok(codes) => codes,
        Err(err) => {
            debug!(error = %err, "Malformed lock-code table; treating as empty");
            HashMap::new()
        }
    }
}

/// Add lock entities for a config entry's broker
pub fn setup_entry(
    broker: &DeviceBroker,
    commands: &Arc<dyn DeviceCommands>,
) -> Vec<SmartThingsLock> {
    let mut entities = Vec::new();
    for device in broker.devices() {
        let room = broker.room_for(&device);
        for capability in broker.get_capabilities(&device) {
            if let Some(descriptions) = descriptions_for(capability) {
                for description in descriptions {
                    entities.push(SmartThingsLock::new(
                        SmartThingsEntity::new(
                            Arc::clone(&device),
                            capability,
                            room.clone(),
                            Arc::clone(commands),
                            broker.dispatcher(),
                        ),
                        description,
                    ));
                }
            }
        }
    }
    entities
}

/// A SmartThings lock entity
pub struct SmartThingsLock {
    entity: SmartThingsEntity,
    description: &'static LockDescription,
}

impl SmartThingsLock {
    pub fn new(entity: SmartThingsEntity, description: &'static LockDescription) -> Self {
        Self {
            entity,
            description,
        }
    }

    pub fn name(&self) -> String {
        self.entity.name(self.description.name)
    }

    pub fn unique_id(&self) -> String {
        self.entity.unique_id(Platform::Lock, self.description.key)
    }

    pub fn device_info(&self) -> DeviceInfo {
        self.entity.device_info()
    }

    pub fn device_id(&self) -> &DeviceId {
        self.entity.device_id()
    }

    /// Lock the lock
    pub async fn lock(&self) -> EntityResult<()> {
        self.entity
            .command_with_update(
                Component::Main,
                "lock",
                vec![],
                self.description.key,
                json!("locked"),
            )
            .await
    }

    /// Unlock the lock
    pub async fn unlock(&self) -> EntityResult<()> {
        self.entity
            .command_with_update(
                Component::Main,
                "unlock",
                vec![],
                self.description.key,
                json!("unlocked"),
            )
            .await
    }

    /// Return true if the lock is locked
    pub fn is_locked(&self) -> EntityResult<bool> {
        let status = self.entity.attribute(Component::Main, self.description.key)?;
        Ok(status.value.as_str() == Some("locked"))
    }

    /// Who triggered the last change: the code name when the reported code
    /// id resolves through the lock-code table, otherwise the reported
    /// method
    pub fn changed_by(&self) -> EntityResult<Option<String>> {
        let status = self.entity.attribute(Component::Main, self.description.key)?;
        let Some(data) = status.data.as_ref().and_then(Value::as_object) else {
            return Ok(None);
        };

        if let Some(code_id) = data.get("codeId").and_then(Value::as_str) {
            if let Some(code_name) = self.lock_codes().get(code_id) {
                return Ok(Some(code_name.clone()));
            }
        }
        if let Some(method) = data.get("method").and_then(Value::as_str) {
            return Ok(Some(method.to_string()));
        }
        Ok(None)
    }

    /// Return device specific state attributes
    pub fn extra_state_attributes(&self) -> EntityResult<HashMap<String, Value>> {
        let mut state_attrs = HashMap::new();
        let status = self.entity.attribute(Component::Main, self.description.key)?;
        let Some(data) = status.data.as_ref().and_then(Value::as_object) else {
            return Ok(state_attrs);
        };

        for (key, attr) in LOCK_ATTR_MAP {
            if let Some(value) = data.get(*key) {
                state_attrs.insert((*attr).to_string(), value.clone());
                if *attr == "code_id" {
                    if let Some(code_name) = value
                        .as_str()
                        .and_then(|id| self.lock_codes().get(id).cloned())
                    {
                        state_attrs.insert("code_name".to_string(), json!(code_name));
                    }
                }
            }
        }
        Ok(state_attrs)
    }

    fn lock_codes(&self) -> HashMap<String, String> {
        self.entity
            .attribute(Component::Main, Attribute::LockCodes)
            .ok()
            .and_then(|status| status.value.as_str().map(decode_lock_codes))
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::entity_for;
    use st_core::{AttributeStatus, Device};

    fn lock_device(value: &str, data: Option<Value>) -> Arc<Device> {
        let device = Device::new("d1".into(), "Schlage Touchscreen Deadbolt Door Lock", "Front Door")
            .with_capabilities(vec![Capability::Lock]);
        device.status.set_attribute(
            "main",
            "lock",
            AttributeStatus {
                value: json!(value),
                unit: None,
                data,
            },
        );
        device.status.set_attribute(
            "main",
            "lockCodes",
            json!("{\"1\":\"Guest\",\"2\":\"Cleaner\"}").into(),
        );
        Arc::new(device)
    }

    fn lock_for(device: Arc<Device>) -> (SmartThingsLock, crate::testutil::EntityFixture) {
        let fx = entity_for(Arc::clone(&device), Capability::Lock, None);
        let lock = SmartThingsLock::new(fx.entity.clone(), &LOCK_DESCRIPTIONS[0].1[0]);
        (lock, fx)
    }

    #[test]
    fn decodes_clean_and_escaped_tables() {
        let clean = decode_lock_codes(r#"{"1":"Guest"}"#);
        assert_eq!(clean.get("1").map(String::as_str), Some("Guest"));

        let escaped = decode_lock_codes(r#"{\"1\":\"Guest\"}"#);
        assert_eq!(escaped.get("1").map(String::as_str), Some("Guest"));

        assert!(decode_lock_codes("not json").is_empty());
        assert!(decode_lock_codes("").is_empty());
    }

    #[test]
    fn is_locked_matches_literal_value() {
        let (lock, _fx) = lock_for(lock_device("locked", None));
        assert!(lock.is_locked().unwrap());

        let (lock, _fx) = lock_for(lock_device("unlocked", None));
        assert!(!lock.is_locked().unwrap());
    }

    #[test]
    fn changed_by_prefers_code_name_over_method() {
        let data = json!({"codeId": "1", "method": "manual"});
        let (lock, _fx) = lock_for(lock_device("unlocked", Some(data)));

        assert_eq!(lock.changed_by().unwrap(), Some("Guest".to_string()));
    }

    #[test]
    fn changed_by_falls_back_to_method() {
        let data = json!({"codeId": "9", "method": "manual"});
        let (lock, _fx) = lock_for(lock_device("unlocked", Some(data)));

        // Code id 9 is not in the table.
        assert_eq!(lock.changed_by().unwrap(), Some("manual".to_string()));
    }

    #[test]
    fn changed_by_without_data_is_none() {
        let (lock, _fx) = lock_for(lock_device("locked", None));
        assert_eq!(lock.changed_by().unwrap(), None);
    }

    #[test]
    fn diagnostic_attributes_are_surfaced() {
        let data = json!({
            "codeId": "2",
            "lockName": "Front Door",
            "method": "keypad",
            "timeout": 30,
        });
        let (lock, _fx) = lock_for(lock_device("locked", Some(data)));

        let attrs = lock.extra_state_attributes().unwrap();
        assert_eq!(attrs.get("code_id"), Some(&json!("2")));
        assert_eq!(attrs.get("code_name"), Some(&json!("Cleaner")));
        assert_eq!(attrs.get("lock_name"), Some(&json!("Front Door")));
        assert_eq!(attrs.get("method"), Some(&json!("keypad")));
        assert_eq!(attrs.get("timeout"), Some(&json!(30)));
        assert!(!attrs.contains_key("used_code"));
    }

    #[tokio::test]
    async fn lock_and_unlock_write_optimistically() {
        let device = lock_device("unlocked", None);
        let (lock, fx) = lock_for(device.clone());

        lock.lock().await.unwrap();
        assert_eq!(
            device.status.main_attribute("lock").unwrap().value,
            json!("locked")
        );
        assert_eq!(fx.commands.calls()[0].command, "lock");
        assert!(fx.commands.calls()[0].arguments.is_empty());

        lock.unlock().await.unwrap();
        assert_eq!(
            device.status.main_attribute("lock").unwrap().value,
            json!("unlocked")
        );
    }

    #[test]
    fn lock_entity_name_is_the_device_label() {
        let (lock, _fx) = lock_for(lock_device("locked", None));
        assert_eq!(lock.name(), "Front Door");
        assert_eq!(lock.unique_id(), "d1-lock-lock");
    }
}
