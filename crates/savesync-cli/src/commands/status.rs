//! Status command - Link state and remote storage usage
//!
//! Provides the `savesync status` CLI command which:
//! 1. Reports whether this device holds a credential
//! 2. When linked, fetches the remote list and shows the quota line

use std::sync::Arc;

use anyhow::Result;
use clap::Args;
use savesync_core::domain::{format_bytes_floor, QuotaUsage};
use tracing::info;

use crate::context::AppContext;

#[derive(Debug, Args)]
pub struct StatusCommand;

/// `"{used} of {total} ({left} left)"`
pub fn quota_line(usage: &QuotaUsage) -> String {
    format!(
        "{} of {} ({} left)",
        format_bytes_floor(usage.used_bytes),
        format_bytes_floor(usage.total_bytes),
        format_bytes_floor(usage.remaining_bytes())
    )
}

impl StatusCommand {
    pub async fn execute(&self, ctx: &AppContext) -> Result<()> {
        let fmt = ctx.formatter();
        let store = ctx.cloud_store();
        let linked = ctx
            .link_controller(Arc::clone(&store))
            .restore_credential()
            .map_err(|e| anyhow::anyhow!(e.user_message()))?;
        info!(linked, "Showing status");

        if !linked {
            if ctx.format.is_json() {
                fmt.print_json(&serde_json::json!({
                    "linked": false,
                    "api": ctx.config.api.base_url,
                }));
            } else {
                fmt.warn("This device is not linked");
                fmt.info("Run 'savesync link' to connect it to your account.");
            }
            return Ok(());
        }

        let orchestrator = ctx.orchestrator(store);
        let remote = orchestrator.refresh_remote().await;

        if ctx.format.is_json() {
            let remote_json = match &remote {
                Ok(items) => {
                    let usage = QuotaUsage::from_items(items);
                    serde_json::json!({
                        "saves": items.len(),
                        "used_bytes": usage.used_bytes,
                        "total_bytes": usage.total_bytes,
                        "remaining_bytes": usage.remaining_bytes(),
                    })
                }
                Err(e) => serde_json::json!({"error": e.user_message()}),
            };
            fmt.print_json(&serde_json::json!({
                "linked": true,
                "api": ctx.config.api.base_url,
                "saves_root": ctx.config.saves.root.display().to_string(),
                "remote": remote_json,
            }));
            return Ok(());
        }

        fmt.success("Linked");
        fmt.info(&format!("Save store: {}", ctx.config.api.base_url));
        fmt.info(&format!("Local saves: {}", ctx.config.saves.root.display()));
        match remote {
            Ok(items) => {
                let usage = QuotaUsage::from_items(&items);
                fmt.info(&format!("Remote saves: {}", items.len()));
                fmt.info(&format!("Storage: {}", quota_line(&usage)));
            }
            Err(e) => {
                fmt.warn(&format!("Could not reach the save store: {}", e.user_message()));
                if e.is_auth_failure() {
                    fmt.info("The stored credential was rejected. Run 'savesync link' again.");
                }
            }
        }
        Ok(())
    }
}
