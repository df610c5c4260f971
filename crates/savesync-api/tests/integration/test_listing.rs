//! Integration tests for list, names and delete
//!
//! Also covers the error classification shared by every JSON endpoint.

use savesync_api::{ApiCloudStore, SaveApiClient};
use savesync_core::domain::{SaveId, SyncError};
use savesync_core::ports::ICloudStore;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, ResponseTemplate};

use crate::common;

#[tokio::test]
async fn test_list_parses_wrapped_records() {
    let (server, store) = common::setup_store_mock().await;
    common::mount_list(
        &server,
        serde_json::json!({
            "result": {
                "saves": [
                    {"saveId": "a1", "worldName": "Survival", "fileSize": "1024",
                     "createdAt": "2024-03-01T08:00:00Z"},
                    {"id": "b2", "title": "Creative", "sizeBytes": 2048},
                    {"name": "no id"}
                ]
            }
        }),
    )
    .await;

    let items = store.list().await.expect("list failed");

    assert_eq!(items.len(), 2);
    assert_eq!(items[0].display_name, "Survival");
    assert_eq!(items[0].size_bytes, 1024);
    assert!(items[0].created_at.is_some());
    assert_eq!(items[1].remote_id().unwrap().as_str(), "b2");
    assert_eq!(items[1].size_bytes, 2048);
}

#[tokio::test]
async fn test_names_returns_strings() {
    let (server, store) = common::setup_store_mock().await;
    Mock::given(method("GET"))
        .and(path("/names"))
        .and(header("X-Save-Key", common::TEST_KEY))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!(["Survival", "Hardcore"])))
        .mount(&server)
        .await;

    let names = store.names().await.unwrap();
    assert_eq!(names, vec!["Survival", "Hardcore"]);
}

#[tokio::test]
async fn test_names_without_array_is_an_error() {
    let (server, store) = common::setup_store_mock().await;
    Mock::given(method("GET"))
        .and(path("/names"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"message": "maintenance"})))
        .mount(&server)
        .await;

    let err = store.names().await.unwrap_err();
    assert!(matches!(err, SyncError::InvalidResponse(_)));
}

#[tokio::test]
async fn test_calls_without_credential_send_nothing() {
    let (server, store) = common::setup_anonymous_mock().await;

    assert_eq!(store.list().await.unwrap_err(), SyncError::NotAuthenticated);
    assert_eq!(store.names().await.unwrap_err(), SyncError::NotAuthenticated);
    let id = SaveId::new("x".to_string()).unwrap();
    assert_eq!(store.delete(&id).await.unwrap_err(), SyncError::NotAuthenticated);

    let received = server.received_requests().await.unwrap();
    assert!(received.is_empty());
}

#[tokio::test]
async fn test_html_page_is_unexpected_content_type() {
    let (server, store) = common::setup_store_mock().await;
    Mock::given(method("GET"))
        .and(path("/list"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw("<html><body>Login required</body></html>", "text/html"),
        )
        .mount(&server)
        .await;

    let err = store.list().await.unwrap_err();
    assert!(matches!(err, SyncError::UnexpectedContentType(ref s) if s.contains("Login required")));
}

#[tokio::test]
async fn test_unauthorized_status_is_classified() {
    let (server, store) = common::setup_store_mock().await;
    Mock::given(method("GET"))
        .and(path("/list"))
        .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
        .mount(&server)
        .await;

    let err = store.list().await.unwrap_err();
    assert_eq!(
        err,
        SyncError::HttpStatus {
            code: 401,
            body: "bad key".to_string()
        }
    );
    assert_eq!(err.user_message(), "Authentication failed");
    assert!(err.is_auth_failure());
}

#[tokio::test]
async fn test_server_error_prefers_json_error_field() {
    let (server, store) = common::setup_store_mock().await;
    Mock::given(method("GET"))
        .and(path("/names"))
        .respond_with(ResponseTemplate::new(500).set_body_json(serde_json::json!({"error": "database offline"})))
        .mount(&server)
        .await;

    let err = store.names().await.unwrap_err();
    assert!(err.user_message().contains("database offline"));
}

#[tokio::test]
async fn test_delete_sends_delete_request() {
    let (server, store) = common::setup_store_mock().await;
    Mock::given(method("DELETE"))
        .and(path("/delete/a1"))
        .and(header("X-Save-Key", common::TEST_KEY))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"success": true})))
        .expect(1)
        .mount(&server)
        .await;

    store
        .delete(&SaveId::new("a1".to_string()).unwrap())
        .await
        .expect("delete failed");
}

#[tokio::test]
async fn test_delete_accepts_empty_body() {
    let (server, store) = common::setup_store_mock().await;
    Mock::given(method("DELETE"))
        .and(path("/delete/a2"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    store
        .delete(&SaveId::new("a2".to_string()).unwrap())
        .await
        .expect("delete failed");
}

#[tokio::test]
async fn test_unreachable_server_is_transport_error() {
    let client = SaveApiClient::with_base_url("http://127.0.0.1:9")
        .with_credential(savesync_core::domain::Credential::new("k").unwrap());
    let store = ApiCloudStore::new(client);

    let err = store.list().await.unwrap_err();
    assert!(matches!(err, SyncError::Transport(_)));
    assert!(err.user_message().starts_with("Network error"));
}
