//! Upload and download streaming
//!
//! - [`upload`] - Multipart upload with a precomputed `Content-Length`
//! - [`download`] - Streaming download into a `.part` file, then rename
//!
//! Uploads are never chunked: some reverse proxies in front of the store
//! reject `Transfer-Encoding: chunked`, so the multipart envelope is laid
//! out up front by [`MultipartLayout`] and its exact length is sent.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures_util::{stream, StreamExt};
use reqwest::header::{HeaderMap, ACCEPT_ENCODING, CONTENT_DISPOSITION, CONTENT_LENGTH, CONTENT_TYPE};
use reqwest::{Body, Method};
use savesync_core::domain::SaveId;
use savesync_core::ports::ProgressFn;
use savesync_core::usecases::TempPathGuard;
use tokio::io::AsyncWriteExt;
use tokio_util::bytes::Bytes;
use tokio_util::io::ReaderStream;
use tracing::{debug, info, warn};

use crate::client::{check_status, parse_json_body, SaveApiClient};
use crate::ApiError;

/// File name used when the server sends no usable `Content-Disposition`
pub const DEFAULT_DOWNLOAD_NAME: &str = "world_save.zip";

/// Headers consulted for the download size, in order
const LENGTH_HEADERS: &[&str] = &[
    "content-length",
    "x-content-length",
    "x-file-size",
    "x-decompressed-content-length",
];

// ============================================================================
// Multipart layout
// ============================================================================

/// The fixed bytes around the file part of an upload body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultipartLayout {
    boundary: String,
    preamble: String,
    epilogue: String,
}

impl MultipartLayout {
    /// Lays out a `WorldName` text part followed by a `SaveFile` zip part
    pub fn new(boundary: &str, world_name: &str, file_name: &str) -> Self {
        let preamble = format!(
            "--{b}\r\n\
             Content-Disposition: form-data; name=\"WorldName\"\r\n\r\n\
             {world}\r\n\
             --{b}\r\n\
             Content-Disposition: form-data; name=\"SaveFile\"; filename=\"{file}\"\r\n\
             Content-Type: application/zip\r\n\r\n",
            b = boundary,
            world = world_name,
            file = file_name.replace('"', "_"),
        );
        Self {
            boundary: boundary.to_string(),
            preamble,
            epilogue: format!("\r\n--{}--\r\n", boundary),
        }
    }

    /// A layout with a fresh random boundary
    pub fn random(world_name: &str, file_name: &str) -> Self {
        let boundary = format!("----{}", uuid::Uuid::new_v4().simple());
        Self::new(&boundary, world_name, file_name)
    }

    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    pub fn preamble(&self) -> &str {
        &self.preamble
    }

    pub fn epilogue(&self) -> &str {
        &self.epilogue
    }

    pub fn content_type(&self) -> String {
        format!("multipart/form-data; boundary={}", self.boundary)
    }

    /// Exact body length for a file of `file_size` bytes
    pub fn content_length(&self, file_size: u64) -> u64 {
        self.preamble.len() as u64 + file_size + self.epilogue.len() as u64
    }
}

// ============================================================================
// Upload
// ============================================================================

/// Streams `archive` to `POST /upload` under `world_name`
///
/// `progress` sees `(0, size)` first, then the running count of file bytes
/// after every chunk. Envelope bytes are never counted.
pub async fn upload(
    client: &SaveApiClient,
    world_name: &str,
    archive: &Path,
    progress: ProgressFn,
) -> Result<(), ApiError> {
    let builder = client.request(Method::POST, "/upload")?;

    let file = tokio::fs::File::open(archive).await?;
    let file_size = file.metadata().await?.len();
    let file_name = archive
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| format!("{}.zip", world_name));

    let layout = MultipartLayout::random(world_name, &file_name);
    let content_length = layout.content_length(file_size);
    info!(world_name, file_size, content_length, "Uploading save");

    progress(0, Some(file_size));

    let sent = Arc::new(AtomicU64::new(0));
    let chunk_progress = Arc::clone(&progress);
    let file_part = ReaderStream::with_capacity(file, client.buffer_size()).map(move |chunk| {
        if let Ok(bytes) = &chunk {
            let so_far = sent.fetch_add(bytes.len() as u64, Ordering::Relaxed) + bytes.len() as u64;
            chunk_progress(so_far, Some(file_size));
        }
        chunk
    });

    let preamble = Bytes::from(layout.preamble().to_string());
    let epilogue = Bytes::from(layout.epilogue().to_string());
    let body = stream::once(async move { Ok::<_, std::io::Error>(preamble) })
        .chain(file_part)
        .chain(stream::once(async move { Ok(epilogue) }));

    let response = builder
        .header(CONTENT_TYPE, layout.content_type())
        .header(CONTENT_LENGTH, content_length)
        .body(Body::wrap_stream(body))
        .send()
        .await?;
    let response = check_status(response).await?;

    // A 2xx HTML page (proxy login, wrong base URL) stored nothing
    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let ack = response.text().await?;
    parse_json_body(content_type.as_deref(), &ack)?;

    info!(world_name, "Upload accepted");
    Ok(())
}

// ============================================================================
// Download
// ============================================================================

/// Download size from the first present length header
pub fn content_length_hint(headers: &HeaderMap) -> Option<u64> {
    LENGTH_HEADERS.iter().find_map(|name| {
        headers
            .get(*name)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok())
    })
}

/// File name from a `Content-Disposition` header value
///
/// Only the final path component is kept, so the result always names a
/// file directly inside the destination directory.
pub fn filename_from_disposition(value: &str) -> Option<String> {
    let start = value.find("filename=")? + "filename=".len();
    let raw = value[start..].split(';').next()?.trim().trim_matches('"');
    let name = raw.rsplit(['/', '\\']).next()?.trim();
    if name.is_empty() || name == "." || name == ".." {
        return None;
    }
    Some(name.to_string())
}

/// Streams `GET /download/{id}` into `dest_dir`, returning the final path
///
/// Bytes land in a `.part` file that is removed on any failure.
pub async fn download(
    client: &SaveApiClient,
    id: &SaveId,
    dest_dir: &Path,
    progress: ProgressFn,
) -> Result<PathBuf, ApiError> {
    let builder = client
        .request(Method::GET, &format!("/download/{}", id))?
        .header(ACCEPT_ENCODING, "identity");
    let response = check_status(builder.send().await?).await?;

    let total = content_length_hint(response.headers());
    let file_name = response
        .headers()
        .get(CONTENT_DISPOSITION)
        .and_then(|v| v.to_str().ok())
        .and_then(filename_from_disposition)
        .unwrap_or_else(|| DEFAULT_DOWNLOAD_NAME.to_string());
    debug!(%id, ?total, file_name, "Download started");

    tokio::fs::create_dir_all(dest_dir).await?;
    let part = TempPathGuard::new(dest_dir.join(format!("{}.{}.part", file_name, uuid::Uuid::new_v4().simple())));
    let mut file = tokio::fs::File::create(part.path()).await?;

    let mut received: u64 = 0;
    progress(0, total);
    let mut body = response.bytes_stream();
    while let Some(chunk) = body.next().await {
        let chunk = chunk?;
        file.write_all(&chunk).await?;
        received += chunk.len() as u64;
        progress(received, total);
    }
    file.flush().await?;
    drop(file);

    let target = dest_dir.join(&file_name);
    move_into_place(part.path(), &target).await?;
    part.disarm();

    info!(%id, bytes = received, path = %target.display(), "Download complete");
    Ok(target)
}

/// Renames `from` onto `to`, falling back to copy and remove
async fn move_into_place(from: &Path, to: &Path) -> Result<(), ApiError> {
    if let Err(e) = tokio::fs::rename(from, to).await {
        warn!(error = %e, "Rename failed, copying instead");
        tokio::fs::copy(from, to).await?;
        tokio::fs::remove_file(from).await?;
    }
    Ok(())
}
