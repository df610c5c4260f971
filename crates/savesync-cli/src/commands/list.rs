//! List command - Show local worlds and remote saves

use anyhow::Result;
use clap::Args;
use savesync_core::domain::{format_bytes, SaveItem};

use crate::context::AppContext;
use crate::output::OutputFormatter;

#[derive(Debug, Args)]
pub struct ListCommand {
    /// Only list worlds in the local saves directory
    #[arg(long, conflicts_with = "remote")]
    pub local: bool,

    /// Only list saves held by the save store
    #[arg(long)]
    pub remote: bool,
}

fn describe(item: &SaveItem) -> String {
    let when = item
        .updated_at
        .or(item.created_at)
        .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "-".to_string());
    match item.remote_id() {
        Some(id) => format!(
            "{:<32} {:>10}  {}  [{}]",
            item.display_name,
            format_bytes(item.size_bytes),
            when,
            id
        ),
        None => format!(
            "{:<32} {:>10}  {}",
            item.display_name,
            format_bytes(item.size_bytes),
            when
        ),
    }
}

fn print_section(fmt: &dyn OutputFormatter, title: &str, items: &[SaveItem]) {
    fmt.success(&format!("{} ({})", title, items.len()));
    if items.is_empty() {
        fmt.info("(none)");
    }
    for item in items {
        fmt.info(&describe(item));
    }
}

impl ListCommand {
    pub async fn execute(&self, ctx: &AppContext) -> Result<()> {
        let fmt = ctx.formatter();
        let show_local = self.local || !self.remote;
        let show_remote = self.remote || !self.local;

        let local = if show_local {
            let orchestrator = ctx.orchestrator(ctx.cloud_store());
            Some(
                orchestrator
                    .list_local()
                    .await
                    .map_err(|e| anyhow::anyhow!(e.user_message()))?,
            )
        } else {
            None
        };

        let remote = if show_remote {
            let store = ctx.linked_store()?;
            let orchestrator = ctx.orchestrator(store);
            Some(
                orchestrator
                    .refresh_remote()
                    .await
                    .map_err(|e| anyhow::anyhow!(e.user_message()))?,
            )
        } else {
            None
        };

        if ctx.format.is_json() {
            let mut out = serde_json::Map::new();
            if let Some(items) = &local {
                out.insert("local".to_string(), serde_json::to_value(items)?);
            }
            if let Some(items) = &remote {
                out.insert("remote".to_string(), serde_json::to_value(items)?);
            }
            fmt.print_json(&serde_json::Value::Object(out));
            return Ok(());
        }

        if let Some(items) = &local {
            print_section(&*fmt, "Local worlds", items);
        }
        if let Some(items) = &remote {
            print_section(&*fmt, "Remote saves", items);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use savesync_core::domain::SaveId;
    use std::path::PathBuf;

    #[test]
    fn test_describe_remote_shows_id() {
        let item = SaveItem::remote(SaveId::new("abc".to_string()).unwrap(), "Survival", 2048);
        let line = describe(&item);
        assert!(line.starts_with("Survival"));
        assert!(line.contains("2.0 KB"));
        assert!(line.ends_with("[abc]"));
    }

    #[test]
    fn test_describe_local_without_timestamps() {
        let item = SaveItem::local(PathBuf::from("/saves/Creative"), "Creative", 10);
        let line = describe(&item);
        assert!(line.contains("10 B"));
        assert!(line.ends_with('-'));
    }
}
