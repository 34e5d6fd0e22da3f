//! Entry lifecycle tests against a mocked cloud API

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use st_bridge::lifecycle::{Bridge, BridgeError};
use st_broker::SmartAppManager;
use st_config_entries::{ConfigEntries, ConfigEntry, ConfigEntryState, SmartAppData, Storage};
use st_core::{DeviceEvent, DeviceId, EventBatch, EventType};

fn entry_data() -> SmartAppData {
    SmartAppData {
        access_token: "at-1".into(),
        client_id: "cid-1".into(),
        client_secret: "cs-1".into(),
        refresh_token: "rt-1".into(),
        installed_app_id: "ia-1".into(),
        app_id: "app-1".into(),
        location_id: "loc-1".into(),
    }
}

struct Fixture {
    _dir: TempDir,
    entries: Arc<ConfigEntries>,
    smartapp: Arc<SmartAppManager>,
    bridge: Bridge,
    entry: ConfigEntry,
}

async fn fixture(server: &MockServer) -> Fixture {
    let dir = TempDir::new().unwrap();
    let storage = Arc::new(Storage::new(dir.path()));
    let entries = Arc::new(ConfigEntries::new(storage));
    let entry = entries
        .add(ConfigEntry::new("Home", entry_data()))
        .await
        .unwrap();
    let smartapp = Arc::new(SmartAppManager::new());
    let bridge = Bridge::new(
        Arc::clone(&entries),
        Arc::clone(&smartapp),
        Some(server.uri()),
    );
    Fixture {
        _dir: dir,
        entries,
        smartapp,
        bridge,
        entry,
    }
}

async fn mount_happy_path(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/apps/app-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "appId": "app-1",
            "appName": "bridge.home",
            "displayName": "Bridge"
        })))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/installedapps/ia-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "installedAppId": "ia-1",
            "locationId": "loc-1",
            "installedAppStatus": "AUTHORIZED"
        })))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/locations/loc-1/rooms"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [{"roomId": "r1", "locationId": "loc-1", "name": "Hallway"}]
        })))
        .mount(server)
        .await;
    // Scene access is forbidden: tolerated as "no scenes available".
    Mock::given(method("GET"))
        .and(path("/scenes"))
        .respond_with(ResponseTemplate::new(403))
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "at-2",
            "token_type": "bearer",
            "refresh_token": "rt-2",
            "expires_in": 86400
        })))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/devices"))
        .and(query_param("locationId", "loc-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [
                {
                    "deviceId": "d1",
                    "name": "Schlage Touchscreen Deadbolt Door Lock",
                    "label": "Front Door",
                    "roomId": "r1",
                    "components": [
                        {"id": "main", "capabilities": [{"id": "lock"}]}
                    ]
                },
                {
                    "deviceId": "d2",
                    "name": "water-battery-tamper",
                    "label": "Basement Sensor",
                    "roomId": "r1",
                    "components": [
                        {"id": "main", "capabilities": [{"id": "battery"}]}
                    ]
                }
            ]
        })))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/devices/d1/status"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "components": {
                "main": {
                    "lock": {
                        "lock": {"value": "locked"}
                    }
                }
            }
        })))
        .mount(server)
        .await;
    // d2's status fetch fails: the device is excluded, not the setup.
    Mock::given(method("GET"))
        .and(path("/devices/d2/status"))
        .respond_with(ResponseTemplate::new(500))
        .mount(server)
        .await;
}

#[tokio::test]
async fn setup_loads_entry_and_excludes_failing_devices() {
    let server = MockServer::start().await;
    mount_happy_path(&server).await;
    let fx = fixture(&server).await;

    fx.bridge.setup_entry(&fx.entry.entry_id).await.unwrap();

    assert!(fx.bridge.is_loaded(&fx.entry.entry_id));
    assert_eq!(
        fx.entries.get(&fx.entry.entry_id).unwrap().state,
        ConfigEntryState::Loaded
    );
    // The rotated refresh token was persisted.
    assert_eq!(
        fx.entries.get(&fx.entry.entry_id).unwrap().data.refresh_token,
        "rt-2"
    );

    let broker = fx.bridge.broker(&fx.entry.entry_id).unwrap();
    assert!(broker.device(&DeviceId::from("d1")).is_some());
    assert!(broker.device(&DeviceId::from("d2")).is_none());
    assert!(broker.scenes().is_empty());

    // The lock device yields a lock entity and its status binary sensor.
    let registry = fx.bridge.registry(&fx.entry.entry_id).unwrap();
    assert_eq!(registry.len(), 2);

    fx.bridge.unload_entry(&fx.entry.entry_id);
}

#[tokio::test]
async fn webhook_batches_reach_the_status_cache() {
    let server = MockServer::start().await;
    mount_happy_path(&server).await;
    let fx = fixture(&server).await;

    fx.bridge.setup_entry(&fx.entry.entry_id).await.unwrap();
    let broker = fx.bridge.broker(&fx.entry.entry_id).unwrap();

    fx.smartapp.dispatch(EventBatch {
        installed_app_id: "ia-1".into(),
        location_id: Some("loc-1".into()),
        events: vec![DeviceEvent {
            event_type: EventType::DeviceEvent,
            device_id: "d1".into(),
            location_id: Some("loc-1".into()),
            component_id: "main".into(),
            capability: "lock".into(),
            attribute: "lock".into(),
            value: json!("unlocked"),
            data: Some(json!({"method": "manual"})),
        }],
    });

    // The broker consumes the relay on its own task; poll briefly.
    let device = broker.device(&DeviceId::from("d1")).unwrap();
    let mut updated = false;
    for _ in 0..50 {
        if device.status.main_attribute("lock").map(|s| s.value) == Some(json!("unlocked")) {
            updated = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(updated, "event batch never reached the status cache");

    fx.bridge.unload_entry(&fx.entry.entry_id);
}

#[tokio::test]
async fn auth_failure_removes_the_entry() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/apps/app-1"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;
    // Cleanup deletes answer 403: already removed.
    Mock::given(method("DELETE"))
        .and(path("/installedapps/ia-1"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/apps/app-1"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    let fx = fixture(&server).await;
    let result = fx.bridge.setup_entry(&fx.entry.entry_id).await;

    assert!(matches!(result, Err(BridgeError::AuthRevoked)));
    assert!(fx.entries.get(&fx.entry.entry_id).is_none());
    assert!(!fx.bridge.is_loaded(&fx.entry.entry_id));
}

#[tokio::test]
async fn other_failures_leave_the_entry_in_retry() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/apps/app-1"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&server)
        .await;

    let fx = fixture(&server).await;
    let result = fx.bridge.setup_entry(&fx.entry.entry_id).await;

    assert!(matches!(result, Err(BridgeError::NotReady(_))));
    assert_eq!(
        fx.entries.get(&fx.entry.entry_id).unwrap().state,
        ConfigEntryState::SetupRetry
    );
    assert!(!fx.bridge.is_loaded(&fx.entry.entry_id));
}

#[tokio::test]
async fn migration_removes_old_entries() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/installedapps/ia-1"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/apps/app-1"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let storage = Arc::new(Storage::new(dir.path()));
    let entries = Arc::new(ConfigEntries::new(storage));
    let mut entry = ConfigEntry::new("Old Home", entry_data());
    entry.version = 2;
    let entry = entries.add(entry).await.unwrap();

    let bridge = Bridge::new(
        Arc::clone(&entries),
        Arc::new(SmartAppManager::new()),
        Some(server.uri()),
    );

    assert!(!bridge.migrate_entry(&entry.entry_id).await.unwrap());
    assert!(entries.get(&entry.entry_id).is_none());
}

#[tokio::test]
async fn unload_is_idempotent_per_entry() {
    let server = MockServer::start().await;
    mount_happy_path(&server).await;
    let fx = fixture(&server).await;

    fx.bridge.setup_entry(&fx.entry.entry_id).await.unwrap();

    assert!(fx.bridge.unload_entry(&fx.entry.entry_id));
    assert!(!fx.bridge.unload_entry(&fx.entry.entry_id));
    assert_eq!(
        fx.entries.get(&fx.entry.entry_id).unwrap().state,
        ConfigEntryState::NotLoaded
    );
}
