//! The SmartThings API client

use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::debug;

use st_core::{AppId, Device, DeviceId, InstalledAppId, LocationId, Room, Scene};

use crate::error::{ApiError, ApiResult};
use crate::models::{
    App, DeviceDto, DeviceStatusDto, InstalledApp, PagedItems, RoomDto, SceneDto,
};
use crate::token::OAuthToken;

/// Production REST endpoint
pub const DEFAULT_API_BASE: &str = "https://api.smartthings.com/v1";

/// Production OAuth token endpoint
pub const DEFAULT_TOKEN_URL: &str = "https://auth-global.api.smartthings.com/oauth/token";

/// Client for the SmartThings cloud API
///
/// Cheap to clone; all clones share the underlying connection pool. The
/// access token is the long-lived personal token from the configuration
/// entry and does not rotate for the lifetime of the client.
#[derive(Debug, Clone)]
pub struct SmartThings {
    http: Client,
    base_url: String,
    token_url: String,
    access_token: String,
}

impl SmartThings {
    /// Create a client against the production endpoints
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            base_url: DEFAULT_API_BASE.to_string(),
            token_url: DEFAULT_TOKEN_URL.to_string(),
            access_token: access_token.into(),
        }
    }

    /// Override the REST base URL (tests)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Override the OAuth token URL (tests)
    pub fn with_token_url(mut self, token_url: impl Into<String>) -> Self {
        self.token_url = token_url.into();
        self
    }

    fn get(&self, path: &str) -> RequestBuilder {
        self.http
            .get(format!("{}{path}", self.base_url))
            .bearer_auth(&self.access_token)
    }

    async fn fetch<T: DeserializeOwned>(&self, path: &str) -> ApiResult<T> {
        let response = self.get(path).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::from_status(status, path));
        }
        Ok(response.json().await?)
    }

    /// Fetch the parent SmartApp record
    pub async fn app(&self, app_id: &AppId) -> ApiResult<App> {
        self.fetch(&format!("/apps/{app_id}")).await
    }

    /// Fetch one installed application instance
    pub async fn installed_app(
        &self,
        installed_app_id: &InstalledAppId,
    ) -> ApiResult<InstalledApp> {
        self.fetch(&format!("/installedapps/{installed_app_id}"))
            .await
    }

    /// List devices at a location, with empty status caches
    pub async fn devices(&self, location_id: &LocationId) -> ApiResult<Vec<Device>> {
        let page: PagedItems<DeviceDto> = self
            .fetch(&format!("/devices?locationId={location_id}"))
            .await?;
        debug!(location = %location_id, count = page.items.len(), "Fetched devices");
        Ok(page.items.into_iter().map(DeviceDto::into_device).collect())
    }

    /// List rooms at a location
    pub async fn rooms(&self, location_id: &LocationId) -> ApiResult<Vec<Room>> {
        let page: PagedItems<RoomDto> = self
            .fetch(&format!("/locations/{location_id}/rooms"))
            .await?;
        Ok(page.items.into_iter().map(RoomDto::into_room).collect())
    }

    /// List scenes at a location
    pub async fn scenes(&self, location_id: &LocationId) -> ApiResult<Vec<Scene>> {
        let page: PagedItems<SceneDto> = self
            .fetch(&format!("/scenes?locationId={location_id}"))
            .await?;
        Ok(page.items.into_iter().map(SceneDto::into_scene).collect())
    }

    /// Fetch a device's full status and load it into the device's cache
    pub async fn refresh_device_status(&self, device: &Device) -> ApiResult<()> {
        let path = format!("/devices/{}/status", device.device_id);
        let dto: DeviceStatusDto = self.fetch(&path).await?;
        for (component_id, capabilities) in dto.components {
            for (_capability, attributes) in capabilities {
                for (attribute, status) in attributes {
                    device.status.set_attribute(&component_id, &attribute, status);
                }
            }
        }
        Ok(())
    }

    /// Execute one command against a device component
    pub async fn execute_command(
        &self,
        device_id: &DeviceId,
        component_id: &str,
        capability: &str,
        command: &str,
        arguments: Vec<Value>,
    ) -> ApiResult<()> {
        let path = format!("/devices/{device_id}/commands");
        debug!(
            device = %device_id,
            component = component_id,
            capability,
            command,
            "Executing device command"
        );
        let response = self
            .http
            .post(format!("{}{path}", self.base_url))
            .bearer_auth(&self.access_token)
            .json(&json!({
                "commands": [{
                    "component": component_id,
                    "capability": capability,
                    "command": command,
                    "arguments": arguments,
                }]
            }))
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::from_status(status, &path));
        }
        Ok(())
    }

    /// Delete one installed application instance
    pub async fn delete_installed_app(
        &self,
        installed_app_id: &InstalledAppId,
    ) -> ApiResult<()> {
        self.delete(&format!("/installedapps/{installed_app_id}"))
            .await
    }

    /// Delete the parent SmartApp
    pub async fn delete_app(&self, app_id: &AppId) -> ApiResult<()> {
        self.delete(&format!("/apps/{app_id}")).await
    }

    async fn delete(&self, path: &str) -> ApiResult<()> {
        let response = self
            .http
            .delete(format!("{}{path}", self.base_url))
            .bearer_auth(&self.access_token)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::from_status(status, path));
        }
        Ok(())
    }

    /// Derive a fresh token pair from a stored refresh token
    ///
    /// The returned pair carries a rotated refresh token which must be
    /// persisted; the old one is invalidated by the exchange.
    pub async fn generate_tokens(
        &self,
        client_id: &str,
        client_secret: &str,
        refresh_token: &str,
    ) -> ApiResult<OAuthToken> {
        let response = self
            .http
            .post(&self.token_url)
            .basic_auth(client_id, Some(client_secret))
            .form(&[
                ("grant_type", "refresh_token"),
                ("client_id", client_id),
                ("refresh_token", refresh_token),
            ])
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::from_status(status, "/oauth/token"));
        }
        let token: OAuthToken = response.json().await?;
        debug!(expires_at = %token.expires_at(), "Generated fresh token pair");
        Ok(token)
    }
}
