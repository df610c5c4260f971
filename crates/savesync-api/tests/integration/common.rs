//! Shared test helpers for save store integration tests
//!
//! Each helper mounts mock endpoints on a wiremock server; the store is
//! pointed at the server's URI with a known credential.

use std::sync::{Arc, Mutex};

use savesync_api::{ApiCloudStore, SaveApiClient};
use savesync_core::domain::Credential;
use savesync_core::ports::ProgressFn;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const TEST_KEY: &str = "test-save-key";

/// Starts a mock server and returns a store holding [`TEST_KEY`]
pub async fn setup_store_mock() -> (MockServer, ApiCloudStore) {
    let server = MockServer::start().await;
    let client = SaveApiClient::with_base_url(server.uri())
        .with_credential(Credential::new(TEST_KEY).unwrap())
        .with_buffer_size(16 * 1024);
    (server, ApiCloudStore::new(client))
}

/// Starts a mock server and returns a store with no credential
pub async fn setup_anonymous_mock() -> (MockServer, ApiCloudStore) {
    let server = MockServer::start().await;
    let client = SaveApiClient::with_base_url(server.uri());
    (server, ApiCloudStore::new(client))
}

/// Mounts `GET /list` answering with `body`, requiring the credential header
pub async fn mount_list(server: &MockServer, body: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path("/list"))
        .and(header("X-Save-Key", TEST_KEY))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

/// Mounts `GET /download/{id}` returning `content` with optional extra headers
pub async fn mount_download(
    server: &MockServer,
    id: &str,
    content: &[u8],
    headers: &[(&str, &str)],
) {
    let mut response = ResponseTemplate::new(200)
        .set_body_raw(content.to_vec(), "application/zip");
    for (name, value) in headers {
        response = response.insert_header(*name, *value);
    }
    Mock::given(method("GET"))
        .and(path(format!("/download/{}", id)))
        .and(header("X-Save-Key", TEST_KEY))
        .and(header("accept-encoding", "identity"))
        .respond_with(response)
        .mount(server)
        .await;
}

/// Collects progress callbacks for later assertions
#[derive(Clone, Default)]
pub struct ProgressLog {
    events: Arc<Mutex<Vec<(u64, Option<u64>)>>>,
}

impl ProgressLog {
    pub fn callback(&self) -> ProgressFn {
        let events = Arc::clone(&self.events);
        Arc::new(move |done, total| events.lock().unwrap().push((done, total)))
    }

    pub fn events(&self) -> Vec<(u64, Option<u64>)> {
        self.events.lock().unwrap().clone()
    }
}
