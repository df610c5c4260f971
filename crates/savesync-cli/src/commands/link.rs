//! Link commands - Device linking and unlinking
//!
//! `savesync link` opens a device-link flow, shows the approval URL (and
//! opens it in the browser), then follows the flow until it completes,
//! expires or fails. Ctrl-C cancels the flow.
//!
//! `savesync unlink` forgets the stored credential.

use std::sync::Arc;

use anyhow::Result;
use clap::Args;
use savesync_core::domain::LinkState;
use savesync_core::usecases::LinkSnapshot;
use tracing::{info, warn};

use crate::context::{AppContext, Reported};
use crate::output::OutputFormatter;

#[derive(Debug, Args)]
pub struct LinkCommand {
    /// Don't open the approval page in a browser
    #[arg(long)]
    pub no_browser: bool,
}

impl LinkCommand {
    pub async fn execute(&self, ctx: &AppContext) -> Result<()> {
        let fmt = ctx.formatter();
        let store = ctx.cloud_store();
        let controller = ctx.link_controller(Arc::clone(&store));

        let started = match controller.start().await {
            Ok(snapshot) => snapshot,
            // the notifier has already printed the failure
            Err(_) => return Err(Reported.into()),
        };
        let url = started.approval_url.clone().unwrap_or_default();

        fmt.success("Link flow started");
        fmt.info(&format!("Approve this device at: {}", url));
        if let Some(expires_at) = started.expires_at {
            fmt.info(&format!("The request expires at {}", expires_at.format("%H:%M:%S UTC")));
        }
        if ctx.config.link.open_browser && !self.no_browser && !ctx.format.is_json() {
            if let Err(e) = webbrowser::open(&url) {
                warn!(error = %e, "Could not open browser");
                fmt.warn("Could not open a browser; open the URL above manually");
            }
        }

        let mut rx = controller.subscribe();
        let mut last_state = started.state.clone();
        let settled = loop {
            {
                let snapshot = rx.borrow_and_update().clone();
                if snapshot.state != last_state {
                    describe_state(&*fmt, &snapshot);
                    last_state = snapshot.state.clone();
                }
                if snapshot.state.is_terminal() || snapshot.state == LinkState::Idle {
                    break snapshot;
                }
            }
            tokio::select! {
                changed = rx.changed() => {
                    if changed.is_err() {
                        break controller.snapshot();
                    }
                }
                _ = tokio::signal::ctrl_c() => {
                    info!("Interrupted, cancelling link flow");
                    controller.cancel().await;
                    fmt.warn("Link flow cancelled");
                    return Err(Reported.into());
                }
            }
        };

        if ctx.format.is_json() {
            fmt.print_json(&serde_json::to_value(&settled)?);
        }
        match settled.state {
            LinkState::Completed => Ok(()),
            _ => Err(Reported.into()),
        }
    }
}

fn describe_state(fmt: &dyn OutputFormatter, snapshot: &LinkSnapshot) {
    match &snapshot.state {
        LinkState::LinkingAccount => {
            if let Some(code) = &snapshot.link_code {
                fmt.info(&format!("Approved. Link code: {}", code));
            }
        }
        LinkState::JoiningServer => fmt.info("Waiting for the in-game link command..."),
        // terminal outcomes are reported by the notifier
        _ => {}
    }
}

#[derive(Debug, Args)]
pub struct UnlinkCommand;

impl UnlinkCommand {
    pub async fn execute(&self, ctx: &AppContext) -> Result<()> {
        let fmt = ctx.formatter();
        let controller = ctx.link_controller(ctx.cloud_store());
        controller
            .unlink()
            .await
            .map_err(|e| anyhow::anyhow!(e.user_message()))?;

        if ctx.format.is_json() {
            fmt.print_json(&serde_json::json!({"success": true, "linked": false}));
        } else {
            fmt.success("Device unlinked");
            fmt.info(&format!(
                "Removed credential from {}",
                ctx.config.credentials.file.display()
            ));
        }
        Ok(())
    }
}
