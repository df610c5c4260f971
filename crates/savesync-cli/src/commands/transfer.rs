//! Transfer commands - Upload, download and delete saves
//!
//! Provides:
//! - `savesync upload <world> [--yes]` - pack and upload a local world,
//!   asking before replacing a remote save with the same name
//! - `savesync download <id>` - download and unpack into a new world folder
//! - `savesync delete <id> [--yes]` - remove a remote save
//!
//! Outcomes are printed by the console notifier; these commands add the
//! live progress line and the prompts.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use savesync_core::domain::{names_collide, SaveId, SaveItem};
use savesync_core::usecases::{SyncOrchestrator, UploadGate};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::commands::confirm;
use crate::context::{AppContext, Reported};
use crate::output::{get_formatter, progress_line, OutputFormat};

/// Redraws the progress line on every snapshot change until aborted
fn spawn_progress(orchestrator: &SyncOrchestrator, format: OutputFormat) -> JoinHandle<()> {
    let mut rx = orchestrator.subscribe();
    tokio::spawn(async move {
        let fmt = get_formatter(format.is_json());
        while rx.changed().await.is_ok() {
            let snapshot = rx.borrow_and_update().clone();
            if let Some(line) = progress_line(&snapshot) {
                fmt.progress(&line);
            }
        }
    })
}

async fn stop_progress(handle: JoinHandle<()>, format: OutputFormat) {
    handle.abort();
    let _ = handle.await;
    get_formatter(format.is_json()).end_progress();
}

fn parse_id(raw: &str) -> Result<SaveId> {
    SaveId::new(raw.to_string()).with_context(|| format!("Invalid save ID '{}'", raw))
}

// ============================================================================
// Upload
// ============================================================================

#[derive(Debug, Args)]
pub struct UploadCommand {
    /// World folder name under the saves directory, or a path to a world folder
    pub world: String,

    /// Replace an existing remote save without asking
    #[arg(short, long)]
    pub yes: bool,
}

/// Resolves the argument to `(world name, directory)`
///
/// A path to an existing directory wins; otherwise the name is matched
/// against the local worlds.
fn resolve_world(arg: &str, local: &[SaveItem]) -> Option<(String, PathBuf)> {
    let as_path = Path::new(arg);
    if as_path.is_dir() {
        let name = as_path.file_name()?.to_string_lossy().into_owned();
        return Some((name, as_path.to_path_buf()));
    }
    local.iter().find_map(|item| {
        let path = item.local_path()?;
        names_collide(&item.display_name, arg).then(|| (item.display_name.clone(), path.to_path_buf()))
    })
}

impl UploadCommand {
    pub async fn execute(&self, ctx: &AppContext) -> Result<()> {
        let fmt = ctx.formatter();
        let orchestrator = ctx.orchestrator(ctx.linked_store()?);

        let local = orchestrator
            .list_local()
            .await
            .map_err(|e| anyhow::anyhow!(e.user_message()))?;
        let (world_name, source_dir) = resolve_world(&self.world, &local).with_context(|| {
            format!(
                "No world named '{}' in {}",
                self.world,
                ctx.config.saves.root.display()
            )
        })?;
        info!(world = %world_name, source = %source_dir.display(), "Upload requested");

        let pending = match orchestrator
            .prepare_upload_dir(&world_name, &source_dir)
            .await
            .map_err(|e| anyhow::anyhow!(e.user_message()))?
        {
            UploadGate::Proceed(pending) => pending,
            UploadGate::ConfirmOverwrite(confirmation) => {
                if !self.yes {
                    if ctx.format.is_json() {
                        anyhow::bail!(
                            "A remote save named '{}' exists; pass --yes to replace it",
                            confirmation.existing_name()
                        );
                    }
                    let question = format!(
                        "A remote save named '{}' already exists. Replace it?",
                        confirmation.existing_name()
                    );
                    if !confirm(&question)? {
                        fmt.info("Upload cancelled");
                        return Ok(());
                    }
                }
                confirmation.confirm()
            }
        };

        let progress = spawn_progress(&orchestrator, ctx.format);
        let result = orchestrator.upload(pending).await;
        stop_progress(progress, ctx.format).await;

        match result {
            Ok(()) => {
                if ctx.format.is_json() {
                    fmt.print_json(&serde_json::json!({"success": true, "world": world_name}));
                }
                Ok(())
            }
            Err(e) => {
                debug!(error = %e.details(), "Upload failed");
                Err(Reported.into())
            }
        }
    }
}

// ============================================================================
// Download
// ============================================================================

#[derive(Debug, Args)]
pub struct DownloadCommand {
    /// ID of the remote save (see `savesync list --remote`)
    pub id: String,
}

impl DownloadCommand {
    pub async fn execute(&self, ctx: &AppContext) -> Result<()> {
        let fmt = ctx.formatter();
        let id = parse_id(&self.id)?;
        let orchestrator = ctx.orchestrator(ctx.linked_store()?);

        let remote = orchestrator
            .refresh_remote()
            .await
            .map_err(|e| anyhow::anyhow!(e.user_message()))?;
        let item = remote
            .into_iter()
            .find(|item| item.remote_id() == Some(&id))
            .with_context(|| format!("No remote save with ID '{}'", id))?;

        let progress = spawn_progress(&orchestrator, ctx.format);
        let result = orchestrator.download(&item).await;
        stop_progress(progress, ctx.format).await;

        match result {
            Ok(dir) => {
                if ctx.format.is_json() {
                    fmt.print_json(&serde_json::json!({
                        "success": true,
                        "world": item.display_name,
                        "path": dir.display().to_string(),
                    }));
                } else {
                    fmt.info(&format!("Saved to {}", dir.display()));
                }
                Ok(())
            }
            Err(e) => {
                debug!(error = %e.details(), "Download failed");
                Err(Reported.into())
            }
        }
    }
}

// ============================================================================
// Delete
// ============================================================================

#[derive(Debug, Args)]
pub struct DeleteCommand {
    /// ID of the remote save
    pub id: String,

    /// Delete without asking
    #[arg(short, long)]
    pub yes: bool,
}

impl DeleteCommand {
    pub async fn execute(&self, ctx: &AppContext) -> Result<()> {
        let fmt = ctx.formatter();
        let id = parse_id(&self.id)?;
        let orchestrator = ctx.orchestrator(ctx.linked_store()?);

        if !self.yes {
            if ctx.format.is_json() {
                anyhow::bail!("Deleting requires --yes in JSON mode");
            }
            let name = orchestrator
                .refresh_remote()
                .await
                .ok()
                .and_then(|items| {
                    items
                        .into_iter()
                        .find(|item| item.remote_id() == Some(&id))
                        .map(|item| item.display_name)
                })
                .unwrap_or_else(|| id.to_string());
            if !confirm(&format!("Delete remote save '{}'? This cannot be undone.", name))? {
                fmt.info("Delete cancelled");
                return Ok(());
            }
        }

        match orchestrator.delete(&id).await {
            Ok(()) => {
                if ctx.format.is_json() {
                    fmt.print_json(&serde_json::json!({"success": true, "id": id.to_string()}));
                }
                Ok(())
            }
            Err(e) => {
                debug!(error = %e.details(), "Delete failed");
                Err(Reported.into())
            }
        }
    }
}
