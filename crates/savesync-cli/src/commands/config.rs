//! Config command - View and check SaveSync configuration
//!
//! Provides the `savesync config` CLI command which:
//! 1. Shows the effective configuration (YAML or JSON)
//! 2. Prints the path of the configuration file in use
//! 3. Validates the configuration file and reports errors

use anyhow::{Context, Result};
use clap::Subcommand;
use savesync_core::config::Config;
use tracing::info;

use crate::context::{AppContext, Reported};

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Display the effective configuration
    Show,
    /// Print the configuration file path
    Path,
    /// Validate the configuration file
    Validate,
}

impl ConfigCommand {
    pub async fn execute(&self, ctx: &AppContext) -> Result<()> {
        match self {
            ConfigCommand::Show => self.execute_show(ctx),
            ConfigCommand::Path => self.execute_path(ctx),
            ConfigCommand::Validate => self.execute_validate(ctx),
        }
    }

    fn execute_show(&self, ctx: &AppContext) -> Result<()> {
        let formatter = ctx.formatter();
        info!(config_path = %ctx.config_path.display(), "Showing configuration");

        if ctx.format.is_json() {
            let json = serde_json::to_value(&ctx.config)
                .context("Failed to serialize configuration to JSON")?;
            formatter.print_json(&json);
            return Ok(());
        }

        let source = if ctx.config_path.exists() {
            ctx.config_path.display().to_string()
        } else {
            format!("defaults; {} not found", ctx.config_path.display())
        };
        formatter.success(&format!("Configuration ({})", source));
        formatter.info("");
        let yaml =
            serde_yaml::to_string(&ctx.config).context("Failed to serialize configuration to YAML")?;
        for line in yaml.lines() {
            formatter.info(line);
        }
        Ok(())
    }

    fn execute_path(&self, ctx: &AppContext) -> Result<()> {
        if ctx.format.is_json() {
            ctx.formatter().print_json(&serde_json::json!({
                "config_path": ctx.config_path.display().to_string(),
                "exists": ctx.config_path.exists(),
                "credentials_file": ctx.config.credentials.file.display().to_string(),
            }));
        } else {
            println!("{}", ctx.config_path.display());
        }
        Ok(())
    }

    fn execute_validate(&self, ctx: &AppContext) -> Result<()> {
        let formatter = ctx.formatter();
        let config_path = &ctx.config_path;

        // Load explicitly: a parse error must not hide behind the defaults
        let config = match Config::load(config_path) {
            Ok(cfg) => cfg,
            Err(_) if !config_path.exists() => {
                if ctx.format.is_json() {
                    formatter.print_json(&serde_json::json!({
                        "valid": true,
                        "config_path": config_path.display().to_string(),
                        "errors": [],
                        "using_defaults": true,
                    }));
                } else {
                    formatter.info(&format!(
                        "Configuration file not found at {}",
                        config_path.display()
                    ));
                    formatter.info("Using the default configuration.");
                }
                return Ok(());
            }
            Err(e) => {
                if ctx.format.is_json() {
                    formatter.print_json(&serde_json::json!({
                        "valid": false,
                        "config_path": config_path.display().to_string(),
                        "errors": [format!("Failed to parse configuration: {}", e)],
                    }));
                } else {
                    formatter.error(&format!("Failed to parse configuration: {}", e));
                    formatter.info(&format!("File: {}", config_path.display()));
                }
                return Err(Reported.into());
            }
        };

        info!(config_path = %config_path.display(), "Validating configuration");
        let errors = config.validate();

        if ctx.format.is_json() {
            let error_strings: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
            formatter.print_json(&serde_json::json!({
                "valid": errors.is_empty(),
                "config_path": config_path.display().to_string(),
                "errors": error_strings,
            }));
        } else if errors.is_empty() {
            formatter.success("Configuration is valid");
            formatter.info(&format!("File: {}", config_path.display()));
        } else {
            formatter.error(&format!(
                "Configuration has {} error{}:",
                errors.len(),
                if errors.len() == 1 { "" } else { "s" }
            ));
            formatter.info(&format!("File: {}", config_path.display()));
            formatter.info("");
            for error in &errors {
                formatter.info(&format!("  {} - {}", error.field, error.message));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(Reported.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::OutputFormat;

    fn context_for(yaml: &str) -> (tempfile::TempDir, AppContext) {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.yaml");
        std::fs::write(&path, yaml).unwrap();
        let ctx = AppContext::load(path.to_str(), OutputFormat::Json, false).unwrap();
        (tmp, ctx)
    }

    #[tokio::test]
    async fn test_validate_accepts_defaults() {
        let (_tmp, ctx) = context_for("logging:\n  level: debug\n");
        ConfigCommand::Validate.execute(&ctx).await.unwrap();
    }

    #[tokio::test]
    async fn test_validate_reports_errors() {
        let (_tmp, ctx) = context_for("link:\n  poll_interval_secs: 0\n");
        let err = ConfigCommand::Validate.execute(&ctx).await.unwrap_err();
        assert!(err.is::<Reported>());
    }

    #[tokio::test]
    async fn test_show_and_path_succeed() {
        let (_tmp, ctx) = context_for("api:\n  timeout_secs: 5\n");
        ConfigCommand::Show.execute(&ctx).await.unwrap();
        ConfigCommand::Path.execute(&ctx).await.unwrap();
    }
}
