//! SaveSync API - Remote save store client
//!
//! Provides async access to the save store:
//! - Listing saves and world names with tolerant JSON parsing
//! - Streaming multipart upload with an exact `Content-Length`
//! - Streaming download into a temporary part file
//! - The device-link initiate and status calls
//! - Encrypted credential storage in the local settings file
//!
//! ## Modules
//!
//! - [`client`] - HTTP client, credential header and response checks
//! - [`listing`] - Tolerant parsing of list and names responses
//! - [`transfer`] - Upload and download streaming
//! - [`link`] - Device-link endpoints
//! - [`provider`] - `ICloudStore` implementation
//! - [`settings`] - `ICredentialStore` implementation

pub mod client;
pub mod link;
pub mod listing;
pub mod provider;
pub mod settings;
pub mod transfer;

pub use client::SaveApiClient;
pub use provider::ApiCloudStore;
pub use settings::SettingsCredentialStore;

use savesync_core::domain::SyncError;
use thiserror::Error;

/// Errors that can occur when talking to the save store
#[derive(Debug, Error)]
pub enum ApiError {
    /// A save-store call was attempted without a credential
    #[error("No credential configured")]
    NotAuthenticated,

    /// The server answered with an error status
    #[error("HTTP {code}: {body}")]
    Status {
        /// Response status code
        code: u16,
        /// Raw response body
        body: String,
    },

    /// A JSON endpoint returned HTML or another non-JSON document
    #[error("Unexpected content type: {0}")]
    UnexpectedContentType(String),

    /// The response was JSON but not in any recognised shape
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// A network-level error occurred
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Reading or writing a local file failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<ApiError> for SyncError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::NotAuthenticated => SyncError::NotAuthenticated,
            ApiError::Status { code, body } => SyncError::HttpStatus { code, body },
            ApiError::UnexpectedContentType(snippet) => SyncError::UnexpectedContentType(snippet),
            ApiError::InvalidResponse(msg) => SyncError::InvalidResponse(msg),
            ApiError::Network(e) => SyncError::Transport(e.to_string()),
            ApiError::Io(e) => SyncError::Io(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_maps_to_http_status() {
        let err: SyncError = ApiError::Status {
            code: 413,
            body: "too big".to_string(),
        }
        .into();
        assert_eq!(
            err,
            SyncError::HttpStatus {
                code: 413,
                body: "too big".to_string()
            }
        );
        assert_eq!(err.user_message(), "File too large: proxy rejected the upload");
    }

    #[test]
    fn test_invalid_response_keeps_its_kind() {
        let err: SyncError = ApiError::InvalidResponse("missing flowId".to_string()).into();
        assert_eq!(err, SyncError::InvalidResponse("missing flowId".to_string()));
        assert!(!err.user_message().starts_with("Network error"));
    }

    #[test]
    fn test_not_authenticated_maps_through() {
        let err: SyncError = ApiError::NotAuthenticated.into();
        assert!(err.is_auth_failure());
    }
}
