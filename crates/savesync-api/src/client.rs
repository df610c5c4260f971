//! Save store HTTP client
//!
//! Wraps `reqwest::Client` with the base URL, the credential header and the
//! response checks shared by every endpoint.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use savesync_api::client::SaveApiClient;
//! use savesync_core::domain::Credential;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = SaveApiClient::with_base_url("https://saves.example.net/api");
//! client.set_credential(Some(Credential::new("secret")?));
//! let names = client.get_json("/names").await?;
//! println!("{}", names);
//! # Ok(())
//! # }
//! ```

use std::sync::RwLock;
use std::time::Duration;

use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Method, RequestBuilder, Response};
use savesync_core::config::{ApiConfig, TransferConfig, DEFAULT_BASE_URL, DEFAULT_CREDENTIAL_HEADER};
use savesync_core::domain::Credential;
use serde_json::Value;
use tracing::{debug, warn};

use crate::ApiError;

/// Default per-request timeout for JSON calls
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default streaming chunk size (64 KiB)
const DEFAULT_BUFFER_SIZE: usize = 64 * 1024;

/// Longest HTML snippet kept in an `UnexpectedContentType` error
const HTML_SNIPPET_LEN: usize = 120;

/// HTTP client for the save store
pub struct SaveApiClient {
    client: Client,
    base_url: String,
    credential_header: String,
    /// The single mutable credential field
    credential: RwLock<Option<Credential>>,
    timeout: Duration,
    buffer_size: usize,
}

impl Default for SaveApiClient {
    fn default() -> Self {
        Self::new()
    }
}

impl SaveApiClient {
    /// Creates a client for the default base URL with no credential
    pub fn new() -> Self {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    /// Creates a client with a custom base URL (useful for testing)
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            credential_header: DEFAULT_CREDENTIAL_HEADER.to_string(),
            credential: RwLock::new(None),
            timeout: DEFAULT_TIMEOUT,
            buffer_size: DEFAULT_BUFFER_SIZE,
        }
    }

    /// Creates a client from the `api` and `transfer` config sections
    pub fn from_config(api: &ApiConfig, transfer: &TransferConfig) -> Self {
        let mut client = Self::with_base_url(api.base_url.clone());
        client.credential_header = api.credential_header.clone();
        client.timeout = Duration::from_secs(api.timeout_secs.max(1));
        client.buffer_size = transfer.buffer_size();
        client
    }

    /// Sets the initial credential
    pub fn with_credential(self, credential: Credential) -> Self {
        self.set_credential(Some(credential));
        self
    }

    /// Sets the streaming chunk size
    pub fn with_buffer_size(mut self, bytes: usize) -> Self {
        self.buffer_size = bytes.max(1);
        self
    }

    /// Replaces the in-memory credential
    pub fn set_credential(&self, credential: Option<Credential>) {
        let present = credential.is_some();
        *self
            .credential
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = credential;
        debug!(present, "Updated save store credential");
    }

    pub fn has_credential(&self) -> bool {
        self.credential
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .is_some()
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    /// Absolute URL for an API path such as `/list`
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn current_credential(&self) -> Option<Credential> {
        self.credential
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Creates an authenticated request builder
    ///
    /// # Errors
    /// [`ApiError::NotAuthenticated`] when no credential is set; nothing is
    /// sent in that case.
    pub fn request(&self, method: Method, path: &str) -> Result<RequestBuilder, ApiError> {
        let credential = self.current_credential().ok_or(ApiError::NotAuthenticated)?;
        Ok(self
            .client
            .request(method, self.url(path))
            .header(self.credential_header.as_str(), credential.expose()))
    }

    /// Creates a request that carries the credential only if one is set
    ///
    /// Used by the device-link calls, which run before any credential exists.
    pub fn optional_auth_request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self.client.request(method, self.url(path));
        match self.current_credential() {
            Some(credential) => builder.header(self.credential_header.as_str(), credential.expose()),
            None => builder,
        }
    }

    /// Sends a JSON request with the configured timeout and parses the body
    pub async fn send_json(&self, builder: RequestBuilder) -> Result<Value, ApiError> {
        let response = builder.timeout(self.timeout).send().await?;
        let response = check_status(response).await?;
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.text().await?;
        parse_json_body(content_type.as_deref(), &body)
    }

    /// `GET path` on an authenticated JSON endpoint
    pub async fn get_json(&self, path: &str) -> Result<Value, ApiError> {
        debug!(path, "GET");
        self.send_json(self.request(Method::GET, path)?).await
    }
}

/// Turns a status >= 400 into [`ApiError::Status`] carrying the raw body
pub async fn check_status(response: Response) -> Result<Response, ApiError> {
    let status = response.status();
    if status.as_u16() < 400 {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    warn!(status = status.as_u16(), "Save store returned an error status");
    Err(ApiError::Status {
        code: status.as_u16(),
        body,
    })
}

/// Parses a JSON endpoint's body
///
/// An empty body is `{}`. HTML (by content type or leading `<`) yields
/// [`ApiError::UnexpectedContentType`].
pub fn parse_json_body(content_type: Option<&str>, body: &str) -> Result<Value, ApiError> {
    let trimmed = body.trim_start();
    let is_html = content_type
        .map(|ct| ct.to_ascii_lowercase().contains("text/html"))
        .unwrap_or(false)
        || trimmed.starts_with('<');
    if is_html {
        let snippet: String = trimmed.chars().take(HTML_SNIPPET_LEN).collect();
        return Err(ApiError::UnexpectedContentType(snippet));
    }
    if trimmed.is_empty() {
        return Ok(Value::Object(Default::default()));
    }
    serde_json::from_str(trimmed).map_err(|e| ApiError::InvalidResponse(e.to_string()))
}
