//! OAuth token record
//!
//! SmartApp refresh tokens expire after 30 days and cannot be recovered once
//! expired, so the broker regenerates them on a 14-day interval and persists
//! the rotated refresh token into the configuration entry.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Tokens returned by the OAuth token endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthToken {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    /// Lifetime of the access token in seconds
    #[serde(default)]
    pub expires_in: u64,
    /// When this token pair was obtained (stamped locally, not on the wire)
    #[serde(default = "Utc::now")]
    pub obtained_at: DateTime<Utc>,
}

fn default_token_type() -> String {
    "bearer".to_string()
}

impl OAuthToken {
    /// When the access token expires
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.obtained_at + chrono::Duration::seconds(self.expires_in as i64)
    }

    /// True once the access token's lifetime has elapsed
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at()
    }
}
