//! SmartThings cloud REST client
//!
//! Wraps the subset of the SmartThings API this bridge exercises: app and
//! installed-app lookup, device/room/scene discovery, full-status refresh,
//! command execution, installed-app/app deletion, and OAuth token
//! regeneration from a stored refresh token.

mod client;
mod error;
mod models;
mod token;

pub use client::{SmartThings, DEFAULT_API_BASE, DEFAULT_TOKEN_URL};
pub use error::{ApiError, ApiResult};
pub use models::{App, InstalledApp};
pub use token::OAuthToken;

// Callers match on `ApiError::Status` without needing reqwest directly.
pub use reqwest::StatusCode;
