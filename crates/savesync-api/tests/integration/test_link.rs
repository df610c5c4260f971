//! Integration tests for the device-link endpoints

use std::time::Duration;

use savesync_core::domain::{Credential, FlowId, SyncError};
use savesync_core::ports::{ICloudStore, LinkStatusKind};
use wiremock::matchers::{method, path};
use wiremock::{Mock, ResponseTemplate};

use crate::common;

#[tokio::test]
async fn test_initiate_without_credential() {
    let (server, store) = common::setup_anonymous_mock().await;
    Mock::given(method("POST"))
        .and(path("/link/initiate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "flowId": "flow-123",
            "expiresInSeconds": 600
        })))
        .expect(1)
        .mount(&server)
        .await;

    let init = store.initiate_link().await.expect("initiate failed");

    assert_eq!(init.flow_id.as_str(), "flow-123");
    assert_eq!(init.expires_in, Duration::from_secs(600));
    assert_eq!(
        init.approval_url,
        format!("{}/link/approve/flow-123", server.uri())
    );

    let requests = server.received_requests().await.unwrap();
    assert!(requests[0].headers.get("X-Save-Key").is_none());
}

#[tokio::test]
async fn test_status_pending_with_code() {
    let (server, store) = common::setup_anonymous_mock().await;
    Mock::given(method("GET"))
        .and(path("/link/status/flow-123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "status": "pending",
            "linkCode": "K7Q2"
        })))
        .mount(&server)
        .await;

    let status = store
        .poll_link(&FlowId::new("flow-123".to_string()).unwrap())
        .await
        .unwrap();

    assert_eq!(status.status, LinkStatusKind::Pending);
    assert_eq!(status.link_code.as_deref(), Some("K7Q2"));
    assert!(!status.account_linked);
}

#[tokio::test]
async fn test_status_completed_carries_key() {
    let (server, store) = common::setup_anonymous_mock().await;
    Mock::given(method("GET"))
        .and(path("/link/status/flow-9"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "status": "completed",
            "saveKey": "issued-key",
            "isAccountLinked": true
        })))
        .mount(&server)
        .await;

    let status = store
        .poll_link(&FlowId::new("flow-9".to_string()).unwrap())
        .await
        .unwrap();

    assert_eq!(status.status, LinkStatusKind::Completed);
    assert_eq!(status.save_key.as_deref(), Some("issued-key"));
    assert!(status.account_linked);

    // the issued key then authorizes save-store calls
    store.set_credential(Some(Credential::new("issued-key").unwrap()));
    assert!(store.has_credential());
}

#[tokio::test]
async fn test_status_html_is_rejected() {
    let (server, store) = common::setup_anonymous_mock().await;
    Mock::given(method("GET"))
        .and(path("/link/status/flow-1"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("<!DOCTYPE html><p>gateway</p>", "text/html"))
        .mount(&server)
        .await;

    let err = store
        .poll_link(&FlowId::new("flow-1".to_string()).unwrap())
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::UnexpectedContentType(_)));
}

#[tokio::test]
async fn test_initiate_server_error() {
    let (server, store) = common::setup_anonymous_mock().await;
    Mock::given(method("POST"))
        .and(path("/link/initiate"))
        .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
        .mount(&server)
        .await;

    let err = store.initiate_link().await.unwrap_err();
    assert!(matches!(err, SyncError::HttpStatus { code: 503, .. }));
}
