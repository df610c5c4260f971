//! Integration tests for streaming upload and download
//!
//! Uploads are checked byte for byte against the multipart envelope,
//! including the exact `Content-Length` header.

use std::path::Path;

use savesync_core::domain::{SaveId, SyncError};
use savesync_core::ports::ICloudStore;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::common::{self, ProgressLog};

// ============================================================================
// Upload tests
// ============================================================================

async fn mount_upload(server: &MockServer, status: u16) {
    Mock::given(method("POST"))
        .and(path("/upload"))
        .and(header("X-Save-Key", common::TEST_KEY))
        .respond_with(ResponseTemplate::new(status))
        .mount(server)
        .await;
}

fn write_archive(dir: &Path, size: usize) -> std::path::PathBuf {
    let archive = dir.join("Survival.zip");
    let content: Vec<u8> = (0..size).map(|i| (i % 251) as u8).collect();
    std::fs::write(&archive, content).unwrap();
    archive
}

#[tokio::test]
async fn test_upload_sends_exact_content_length() {
    for size in [0usize, 1, 65_536, 10_000_000] {
        let (server, store) = common::setup_store_mock().await;
        mount_upload(&server, 200).await;
        let tmp = tempfile::tempdir().unwrap();
        let archive = write_archive(tmp.path(), size);
        let log = ProgressLog::default();

        store
            .upload("Survival", &archive, log.callback())
            .await
            .unwrap_or_else(|e| panic!("upload of {} bytes failed: {}", size, e));

        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 1);
        let request = &requests[0];

        let content_type = request.headers.get("content-type").unwrap().to_str().unwrap();
        let boundary = content_type
            .strip_prefix("multipart/form-data; boundary=")
            .expect("multipart content type");
        assert!(boundary.starts_with("----"));

        let declared: usize = request
            .headers
            .get("content-length")
            .unwrap()
            .to_str()
            .unwrap()
            .parse()
            .unwrap();
        assert_eq!(declared, request.body.len());
        assert!(request.headers.get("transfer-encoding").is_none());

        let preamble = format!(
            "--{b}\r\nContent-Disposition: form-data; name=\"WorldName\"\r\n\r\nSurvival\r\n\
             --{b}\r\nContent-Disposition: form-data; name=\"SaveFile\"; filename=\"Survival.zip\"\r\n\
             Content-Type: application/zip\r\n\r\n",
            b = boundary
        );
        let epilogue = format!("\r\n--{}--\r\n", boundary);
        assert_eq!(declared, preamble.len() + size + epilogue.len());
        assert!(request.body.starts_with(preamble.as_bytes()));
        assert!(request.body.ends_with(epilogue.as_bytes()));
        assert_eq!(
            &request.body[preamble.len()..preamble.len() + size],
            std::fs::read(&archive).unwrap().as_slice()
        );

        let events = log.events();
        assert_eq!(events.first(), Some(&(0, Some(size as u64))));
        assert_eq!(events.last(), Some(&(size as u64, Some(size as u64))));
        assert!(events.windows(2).all(|w| w[0].0 <= w[1].0));
    }
}

#[tokio::test]
async fn test_upload_progress_follows_chunks() {
    let (server, store) = common::setup_store_mock().await;
    mount_upload(&server, 200).await;
    let tmp = tempfile::tempdir().unwrap();
    let archive = write_archive(tmp.path(), 100_000);
    let log = ProgressLog::default();

    store.upload("Survival", &archive, log.callback()).await.unwrap();

    let events = log.events();
    // initial event plus at least one per 16 KiB chunk
    assert!(events.len() >= 1 + 100_000 / (16 * 1024));
    assert!(events.iter().all(|(_, total)| *total == Some(100_000)));
}

#[tokio::test]
async fn test_upload_rejected_by_proxy() {
    let (server, store) = common::setup_store_mock().await;
    mount_upload(&server, 413).await;
    let tmp = tempfile::tempdir().unwrap();
    let archive = write_archive(tmp.path(), 1_000);

    let err = store
        .upload("Survival", &archive, ProgressLog::default().callback())
        .await
        .unwrap_err();

    assert!(matches!(err, SyncError::HttpStatus { code: 413, .. }));
    assert_eq!(err.user_message(), "File too large: proxy rejected the upload");
}

#[tokio::test]
async fn test_upload_html_acknowledgement_is_rejected() {
    let (server, store) = common::setup_store_mock().await;
    Mock::given(method("POST"))
        .and(path("/upload"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/html; charset=utf-8")
                .set_body_string("<!DOCTYPE html><html><body>Sign in</body></html>"),
        )
        .mount(&server)
        .await;
    let tmp = tempfile::tempdir().unwrap();
    let archive = write_archive(tmp.path(), 1_000);

    let err = store
        .upload("Survival", &archive, ProgressLog::default().callback())
        .await
        .unwrap_err();

    assert!(matches!(err, SyncError::UnexpectedContentType(_)));
}

#[tokio::test]
async fn test_upload_accepts_json_acknowledgement() {
    let (server, store) = common::setup_store_mock().await;
    Mock::given(method("POST"))
        .and(path("/upload"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"success": true})))
        .mount(&server)
        .await;
    let tmp = tempfile::tempdir().unwrap();
    let archive = write_archive(tmp.path(), 10);

    store
        .upload("Survival", &archive, ProgressLog::default().callback())
        .await
        .unwrap();
}

#[tokio::test]
async fn test_upload_missing_archive_is_io_error() {
    let (_server, store) = common::setup_store_mock().await;
    let tmp = tempfile::tempdir().unwrap();

    let err = store
        .upload("Survival", &tmp.path().join("gone.zip"), ProgressLog::default().callback())
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::Io(_)));
}

// ============================================================================
// Download tests
// ============================================================================

fn dir_entries(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

#[tokio::test]
async fn test_download_uses_disposition_name() {
    let (server, store) = common::setup_store_mock().await;
    let content: Vec<u8> = (0..200_000).map(|i| (i % 256) as u8).collect();
    common::mount_download(
        &server,
        "a1",
        &content,
        &[("content-disposition", "attachment; filename=\"Survival.zip\"")],
    )
    .await;
    let tmp = tempfile::tempdir().unwrap();
    let log = ProgressLog::default();

    let path = store
        .download(&SaveId::new("a1".to_string()).unwrap(), tmp.path(), log.callback())
        .await
        .expect("download failed");

    assert_eq!(path, tmp.path().join("Survival.zip"));
    assert_eq!(std::fs::read(&path).unwrap(), content);
    assert_eq!(dir_entries(tmp.path()), vec!["Survival.zip"]);

    let events = log.events();
    assert_eq!(events.first(), Some(&(0, Some(200_000))));
    assert_eq!(events.last(), Some(&(200_000, Some(200_000))));
}

#[tokio::test]
async fn test_download_defaults_name() {
    let (server, store) = common::setup_store_mock().await;
    common::mount_download(&server, "b2", b"zip-bytes", &[]).await;
    let tmp = tempfile::tempdir().unwrap();

    let path = store
        .download(
            &SaveId::new("b2".to_string()).unwrap(),
            tmp.path(),
            ProgressLog::default().callback(),
        )
        .await
        .unwrap();

    assert_eq!(path.file_name().unwrap(), "world_save.zip");
    assert_eq!(std::fs::read(&path).unwrap(), b"zip-bytes");
}

#[tokio::test]
async fn test_download_hostile_name_stays_in_destination() {
    let (server, store) = common::setup_store_mock().await;
    common::mount_download(
        &server,
        "c3",
        b"zip",
        &[("content-disposition", "attachment; filename=\"../../outside.zip\"")],
    )
    .await;
    let tmp = tempfile::tempdir().unwrap();
    let dest = tmp.path().join("dest");

    let path = store
        .download(
            &SaveId::new("c3".to_string()).unwrap(),
            &dest,
            ProgressLog::default().callback(),
        )
        .await
        .unwrap();

    assert_eq!(path, dest.join("outside.zip"));
    assert!(!tmp.path().join("outside.zip").exists());
}

#[tokio::test]
async fn test_download_error_leaves_no_files() {
    let (server, store) = common::setup_store_mock().await;
    Mock::given(method("GET"))
        .and(path("/download/missing"))
        .respond_with(ResponseTemplate::new(404).set_body_string("not found"))
        .mount(&server)
        .await;
    let tmp = tempfile::tempdir().unwrap();

    let err = store
        .download(
            &SaveId::new("missing".to_string()).unwrap(),
            tmp.path(),
            ProgressLog::default().callback(),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, SyncError::HttpStatus { code: 404, .. }));
    assert!(dir_entries(tmp.path()).is_empty());
}
