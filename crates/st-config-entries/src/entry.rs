//! Config entry types
//!
//! A ConfigEntry represents a single installed SmartApp instance.

use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use ulid::Ulid;

use st_core::{AppId, InstalledAppId, LocationId};

/// Current entry schema version; older entries cannot be migrated in place
/// and must go through a fresh authorization.
pub const CURRENT_VERSION: u32 = 3;

/// SmartThings ids are either 32 hex characters or a dashed UUID
const UID_PATTERN: &str = "^(?:([0-9a-fA-F]{32})|([0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}))$";

fn uid_regex() -> &'static Regex {
    static UID_RE: OnceLock<Regex> = OnceLock::new();
    UID_RE.get_or_init(|| Regex::new(UID_PATTERN).expect("static pattern compiles"))
}

/// Validate a SmartThings uid (app, location, or installed-app id)
pub fn is_valid_uid(uid: &str) -> bool {
    uid_regex().is_match(uid)
}

/// Derive an entry's unique id from its app and location
pub fn format_unique_id(app_id: &AppId, location_id: &LocationId) -> String {
    format!("{app_id}_{location_id}")
}

/// Config entry lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ConfigEntryState {
    /// Initial state, not yet set up
    #[default]
    NotLoaded,
    /// Currently being configured (non-recoverable)
    SetupInProgress,
    /// Successfully set up (recoverable)
    Loaded,
    /// Setup failed (recoverable)
    SetupError,
    /// Waiting to retry setup (recoverable)
    SetupRetry,
    /// Schema migration failed; fresh authorization required
    MigrationError,
    /// Currently unloading (non-recoverable)
    UnloadInProgress,
}

impl ConfigEntryState {
    /// Check if the entry can be unloaded/reloaded from this state
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ConfigEntryState::Loaded
                | ConfigEntryState::SetupError
                | ConfigEntryState::SetupRetry
                | ConfigEntryState::NotLoaded
        )
    }
}

/// Typed credential and scoping fields of one installed SmartApp
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SmartAppData {
    /// Long-lived personal access token used by the REST client
    pub access_token: String,
    pub client_id: String,
    pub client_secret: String,
    /// Rotated on every token regeneration; expires after 30 days unused
    pub refresh_token: String,
    pub installed_app_id: InstalledAppId,
    pub app_id: AppId,
    pub location_id: LocationId,
}

impl SmartAppData {
    /// True when all three SmartThings ids have a valid uid shape
    pub fn has_valid_ids(&self) -> bool {
        is_valid_uid(self.app_id.as_str())
            && is_valid_uid(self.location_id.as_str())
            && is_valid_uid(self.installed_app_id.as_str())
    }
}

/// A configuration entry for one installed SmartApp
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigEntry {
    /// Unique identifier (ULID)
    pub entry_id: String,

    /// Human-readable display name (typically the location name)
    pub title: String,

    /// `{app_id}_{location_id}`, stable across re-setups
    pub unique_id: String,

    /// Credential and scoping data
    pub data: SmartAppData,

    /// Schema version the entry was created under
    pub version: u32,

    /// Lifecycle state (not persisted; entries load as NotLoaded)
    #[serde(skip)]
    pub state: ConfigEntryState,

    /// Reason for the current state, when it is an error state
    #[serde(skip)]
    pub reason: Option<String>,

    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

impl ConfigEntry {
    /// Create a new entry at the current schema version
    pub fn new(title: impl Into<String>, data: SmartAppData) -> Self {
        let now = Utc::now();
        Self {
            entry_id: Ulid::new().to_string(),
            title: title.into(),
            unique_id: format_unique_id(&data.app_id, &data.location_id),
            data,
            version: CURRENT_VERSION,
            state: ConfigEntryState::default(),
            reason: None,
            created_at: now,
            modified_at: now,
        }
    }

    /// True when the entry is set up and running
    pub fn is_loaded(&self) -> bool {
        self.state == ConfigEntryState::Loaded
    }

    /// True when the entry predates the current schema version
    pub fn needs_migration(&self) -> bool {
        self.version < CURRENT_VERSION
    }
}
