//! Device-link endpoints
//!
//! `POST /link/initiate` opens a flow and `GET /link/status/{flowId}`
//! reports on it. Neither call needs a credential.

use std::time::Duration;

use reqwest::Method;
use savesync_core::domain::FlowId;
use savesync_core::ports::{LinkInitiation, LinkStatus, LinkStatusKind};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info};

use crate::client::SaveApiClient;
use crate::ApiError;

/// Flow lifetime assumed when the server does not report one
pub const DEFAULT_FLOW_EXPIRY: Duration = Duration::from_secs(300);

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InitiateResponse {
    flow_id: Option<String>,
    expires_in_seconds: Option<u64>,
    approval_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct StatusResponse {
    status: Option<String>,
    save_key: Option<String>,
    link_code: Option<String>,
    is_account_linked: Option<bool>,
    linking_complete: Option<bool>,
}

fn status_kind(raw: Option<&str>) -> LinkStatusKind {
    match raw.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
        Some("completed") => LinkStatusKind::Completed,
        Some("expired") => LinkStatusKind::Expired,
        _ => LinkStatusKind::Pending,
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

/// Parses an initiate response, filling in the approval URL if absent
pub fn parse_initiation(base_url: &str, value: Value) -> Result<LinkInitiation, ApiError> {
    let raw: InitiateResponse =
        serde_json::from_value(value).map_err(|e| ApiError::InvalidResponse(e.to_string()))?;
    let flow_id = non_blank(raw.flow_id)
        .ok_or_else(|| ApiError::InvalidResponse("initiate response has no flowId".to_string()))?;
    let flow_id = FlowId::new(flow_id).map_err(|e| ApiError::InvalidResponse(e.to_string()))?;

    let approval_url = non_blank(raw.approval_url)
        .unwrap_or_else(|| format!("{}/link/approve/{}", base_url, flow_id));
    let expires_in = raw
        .expires_in_seconds
        .filter(|secs| *secs > 0)
        .map(Duration::from_secs)
        .unwrap_or(DEFAULT_FLOW_EXPIRY);

    Ok(LinkInitiation {
        flow_id,
        approval_url,
        expires_in,
    })
}

/// Parses a status response; an unknown status reads as pending
pub fn parse_status(value: Value) -> Result<LinkStatus, ApiError> {
    let raw: StatusResponse =
        serde_json::from_value(value).map_err(|e| ApiError::InvalidResponse(e.to_string()))?;
    Ok(LinkStatus {
        status: status_kind(raw.status.as_deref()),
        save_key: non_blank(raw.save_key),
        link_code: non_blank(raw.link_code),
        account_linked: raw.is_account_linked.unwrap_or(false) || raw.linking_complete.unwrap_or(false),
    })
}

/// Starts a device-link flow
pub async fn initiate_link(client: &SaveApiClient) -> Result<LinkInitiation, ApiError> {
    let value = client
        .send_json(client.optional_auth_request(Method::POST, "/link/initiate"))
        .await?;
    let initiation = parse_initiation(client.base_url(), value)?;
    info!(
        flow_id = %initiation.flow_id,
        expires_in_secs = initiation.expires_in.as_secs(),
        "Link flow initiated"
    );
    Ok(initiation)
}

/// Fetches the current status of a link flow
pub async fn poll_link(client: &SaveApiClient, flow_id: &FlowId) -> Result<LinkStatus, ApiError> {
    let value = client
        .send_json(client.optional_auth_request(Method::GET, &format!("/link/status/{}", flow_id)))
        .await?;
    let status = parse_status(value)?;
    debug!(%flow_id, status = ?status.status, has_code = status.link_code.is_some(), "Link status");
    Ok(status)
}
