//! SaveSync CLI - Command-line interface for SaveSync
//!
//! Provides commands for:
//! - Linking this device to a save store account
//! - Listing local worlds and remote saves
//! - Uploading, downloading and deleting saves
//! - Viewing and validating the configuration

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod console;
mod context;
mod output;

use commands::{
    config::ConfigCommand,
    link::{LinkCommand, UnlinkCommand},
    list::ListCommand,
    status::StatusCommand,
    transfer::{DeleteCommand, DownloadCommand, UploadCommand},
};
use context::{AppContext, Reported};
use output::{get_formatter, OutputFormat};

#[derive(Debug, Parser)]
#[command(name = "savesync", version, about = "Back up and restore game worlds to a cloud save store")]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    json: bool,

    /// Verbose output (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Use alternate config file
    #[arg(long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Link this device to your account
    Link(LinkCommand),
    /// Forget the stored credential
    Unlink(UnlinkCommand),
    /// Show link state and remote storage usage
    Status(StatusCommand),
    /// List local worlds and remote saves
    List(ListCommand),
    /// Pack and upload a local world
    Upload(UploadCommand),
    /// Download a remote save into a new world folder
    Download(DownloadCommand),
    /// Delete a remote save
    Delete(DeleteCommand),
    /// View and check configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

/// Filter directive: `-v` wins over the configured level
fn log_filter(verbose: u8, configured: &str) -> String {
    match verbose {
        0 => configured.to_string(),
        1 => "debug".to_string(),
        _ => "trace".to_string(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Human
    };
    let ctx = AppContext::load(cli.config.as_deref(), format, cli.verbose > 0)?;

    // Setup tracing; RUST_LOG overrides both
    let filter = log_filter(cli.verbose, &ctx.config.logging.level);
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let result = match &cli.command {
        Commands::Link(cmd) => cmd.execute(&ctx).await,
        Commands::Unlink(cmd) => cmd.execute(&ctx).await,
        Commands::Status(cmd) => cmd.execute(&ctx).await,
        Commands::List(cmd) => cmd.execute(&ctx).await,
        Commands::Upload(cmd) => cmd.execute(&ctx).await,
        Commands::Download(cmd) => cmd.execute(&ctx).await,
        Commands::Delete(cmd) => cmd.execute(&ctx).await,
        Commands::Config(cmd) => cmd.execute(&ctx).await,
    };

    if let Err(e) = result {
        if !e.is::<Reported>() {
            get_formatter(cli.json).error(&format!("{:#}", e));
        }
        std::process::exit(1);
    }
    Ok(())
}
