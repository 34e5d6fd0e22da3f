//! Cloud API errors
//!
//! The taxonomy the lifecycle relies on: authorization failures (401/403)
//! trigger entry removal and reauthorization, every other HTTP or connection
//! failure is retriable "not ready".

use reqwest::StatusCode;
use thiserror::Error;

/// Errors produced by the SmartThings client
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("unauthorized: the access token was rejected")]
    Unauthorized,

    #[error("forbidden: the token does not grant the required access")]
    Forbidden,

    #[error("unexpected status {status} from {endpoint}")]
    Status { status: StatusCode, endpoint: String },

    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
}

impl ApiError {
    /// Map a non-success response status to the matching error
    pub(crate) fn from_status(status: StatusCode, endpoint: &str) -> Self {
        match status {
            StatusCode::UNAUTHORIZED => ApiError::Unauthorized,
            StatusCode::FORBIDDEN => ApiError::Forbidden,
            _ => ApiError::Status {
                status,
                endpoint: endpoint.to_string(),
            },
        }
    }

    /// True for 401/403 responses, which mean the entry must be
    /// reauthorized rather than retried
    pub fn is_auth_error(&self) -> bool {
        matches!(self, ApiError::Unauthorized | ApiError::Forbidden)
    }

    /// True for 403 specifically (used where "already removed" and
    /// "no scene access" are tolerated)
    pub fn is_forbidden(&self) -> bool {
        matches!(self, ApiError::Forbidden)
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
