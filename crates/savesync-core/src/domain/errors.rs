//! Domain error types
//!
//! [`DomainError`] covers validation of domain values. [`SyncError`] is the
//! taxonomy surfaced by every port and use case; adapters map their own
//! failures into it so the orchestrator can classify them for display.

use thiserror::Error;

/// Maximum number of characters of a response body kept in a short message
const BODY_PREVIEW_CHARS: usize = 200;

/// Errors that can occur when constructing domain values
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Invalid save identifier
    #[error("Invalid save ID: {0}")]
    InvalidSaveId(String),

    /// Invalid link flow identifier
    #[error("Invalid flow ID: {0}")]
    InvalidFlowId(String),

    /// Credential string is empty or malformed
    #[error("Invalid credential: {0}")]
    InvalidCredential(String),

    /// Invalid state transition attempt
    #[error("Invalid state transition from {from} to {to}")]
    InvalidState {
        /// The current state
        from: String,
        /// The attempted target state
        to: String,
    },
}

/// Errors surfaced by transfers, archives and the device-link flow
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SyncError {
    /// A save-store call was made before any credential was set
    #[error("Not authenticated: no credential configured")]
    NotAuthenticated,

    /// Connection-level failure (DNS, TLS, reset, timeout)
    #[error("Transport error: {0}")]
    Transport(String),

    /// The server answered with a status code >= 400
    #[error("HTTP {code}: {body}")]
    HttpStatus {
        /// Response status code
        code: u16,
        /// Raw response body
        body: String,
    },

    /// A JSON endpoint returned something else (typically an HTML error page)
    #[error("Unexpected content type: {0}")]
    UnexpectedContentType(String),

    /// The body was JSON (or claimed to be) but not in an expected shape
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Packing or unpacking failed, including rejected archive entries
    #[error("Archive error: {0}")]
    Archive(String),

    /// The link flow ran out of time before completing
    #[error("Link flow expired")]
    FlowExpired,

    /// The link flow completed without a usable result
    #[error("Link flow failed: {0}")]
    FlowFailed(String),

    /// An operation was started while another one is in flight
    #[error("Another operation is already in progress")]
    Busy,

    /// Local settings could not be read, decrypted or written
    #[error("Settings error: {0}")]
    Settings(String),

    /// Local filesystem failure outside of archive handling
    #[error("I/O error: {0}")]
    Io(String),
}

impl SyncError {
    /// Short, user-facing description of the failure
    pub fn user_message(&self) -> String {
        match self {
            SyncError::NotAuthenticated => "Not linked: run the device link first".to_string(),
            SyncError::HttpStatus { code, body } => match code {
                401 | 403 => "Authentication failed".to_string(),
                413 => "File too large: proxy rejected the upload".to_string(),
                429 => "Rate limited: try again in a moment".to_string(),
                _ => format!("HTTP {}: {}", code, short_body(body)),
            },
            SyncError::Transport(msg) => format!("Network error: {}", msg),
            SyncError::UnexpectedContentType(_) => {
                "Unexpected response from server (HTML instead of JSON)".to_string()
            }
            SyncError::InvalidResponse(msg) => format!("Unexpected response from server: {}", msg),
            SyncError::Archive(msg) => format!("Archive error: {}", msg),
            SyncError::FlowExpired => "Link code expired, start again".to_string(),
            SyncError::FlowFailed(msg) => format!("Linking failed: {}", msg),
            SyncError::Busy => "Another transfer is already running".to_string(),
            SyncError::Settings(msg) => format!("Settings error: {}", msg),
            SyncError::Io(msg) => format!("File error: {}", msg),
        }
    }

    /// Full raw error text, for a "details" view
    pub fn details(&self) -> String {
        self.to_string()
    }

    /// Returns true if the failure is an authentication rejection
    pub fn is_auth_failure(&self) -> bool {
        matches!(
            self,
            SyncError::NotAuthenticated | SyncError::HttpStatus { code: 401 | 403, .. }
        )
    }
}

impl From<std::io::Error> for SyncError {
    fn from(err: std::io::Error) -> Self {
        SyncError::Io(err.to_string())
    }
}

/// Prefer the `error` field of a JSON body, otherwise a truncated raw body
fn short_body(body: &str) -> String {
    if let Ok(serde_json::Value::Object(obj)) = serde_json::from_str::<serde_json::Value>(body) {
        if let Some(serde_json::Value::String(err)) = obj.get("error") {
            return err.clone();
        }
    }

    let trimmed = body.trim();
    if trimmed.chars().count() > BODY_PREVIEW_CHARS {
        let head: String = trimmed.chars().take(BODY_PREVIEW_CHARS).collect();
        format!("{}...", head)
    } else {
        trimmed.to_string()
    }
}
