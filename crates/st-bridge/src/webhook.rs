//! SmartThings webhook endpoint
//!
//! The cloud delivers lifecycle requests to one POST route. `PING` echoes
//! the challenge, `CONFIRMATION` acknowledges the confirmation URL, and
//! `EVENT` deliveries are parsed into an `EventBatch` and relayed to the
//! connected brokers. Anything else is answered 200 so the cloud does not
//! retry.

use std::sync::Arc;

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info};

use st_broker::SmartAppManager;
use st_core::{DeviceEvent, EventBatch, EventType, InstalledAppId, LocationId};

#[derive(Clone)]
struct WebhookState {
    smartapp: Arc<SmartAppManager>,
}

/// Build the webhook router
pub fn router(smartapp: Arc<SmartAppManager>) -> Router {
    Router::new()
        .route("/webhook", post(handle_lifecycle))
        .with_state(WebhookState { smartapp })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventData {
    installed_app: InstalledAppRef,
    #[serde(default)]
    events: Vec<EventEnvelope>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InstalledAppRef {
    installed_app_id: InstalledAppId,
    #[serde(default)]
    location_id: Option<LocationId>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventEnvelope {
    event_type: EventType,
    #[serde(default)]
    device_event: Option<DeviceEventPayload>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DeviceEventPayload {
    device_id: st_core::DeviceId,
    #[serde(default)]
    location_id: Option<LocationId>,
    component_id: String,
    capability: String,
    attribute: String,
    value: Value,
    #[serde(default)]
    data: Option<Value>,
}

impl EventData {
    fn into_batch(self) -> EventBatch {
        let events = self
            .events
            .into_iter()
            .filter_map(|envelope| {
                let payload = envelope.device_event?;
                Some(DeviceEvent {
                    event_type: envelope.event_type,
                    device_id: payload.device_id,
                    location_id: payload.location_id,
                    component_id: payload.component_id,
                    capability: payload.capability,
                    attribute: payload.attribute,
                    value: payload.value,
                    data: payload.data,
                })
            })
            .collect();

        EventBatch {
            installed_app_id: self.installed_app.installed_app_id,
            location_id: self.installed_app.location_id,
            events,
        }
    }
}

async fn handle_lifecycle(
    State(state): State<WebhookState>,
    Json(payload): Json<Value>,
) -> Json<Value> {
    match payload.get("lifecycle").and_then(Value::as_str) {
        Some("PING") => {
            let challenge = payload
                .pointer("/pingData/challenge")
                .cloned()
                .unwrap_or(Value::Null);
            debug!("Answering webhook ping");
            Json(json!({ "pingData": { "challenge": challenge } }))
        }
        Some("CONFIRMATION") => {
            let target_url = payload
                .pointer("/confirmationData/confirmationUrl")
                .cloned()
                .unwrap_or(Value::Null);
            info!(url = %target_url, "Webhook confirmation requested");
            Json(json!({ "targetUrl": target_url }))
        }
        Some("EVENT") => {
            match payload
                .get("eventData")
                .cloned()
                .map(serde_json::from_value::<EventData>)
            {
                Some(Ok(event_data)) => {
                    state.smartapp.dispatch(event_data.into_batch());
                }
                Some(Err(err)) => {
                    debug!(error = %err, "Discarding malformed event delivery");
                }
                None => {
                    debug!("Event delivery without eventData");
                }
            }
            Json(json!({ "eventData": {} }))
        }
        other => {
            debug!(lifecycle = ?other, "Ignoring webhook lifecycle");
            Json(json!({}))
        }
    }
}
