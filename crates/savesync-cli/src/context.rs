//! Adapter wiring shared by the commands
//!
//! Builds the HTTP store, archiver, credential store and the two use cases
//! from the loaded configuration.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use savesync_api::{ApiCloudStore, SaveApiClient, SettingsCredentialStore};
use savesync_archive::{FsLocalSaves, ZipArchiver};
use savesync_core::config::Config;
use savesync_core::usecases::{LinkFlowController, LinkSettings, OrchestratorSettings, SyncOrchestrator};
use tracing::debug;

use crate::console::{ConsoleGameSession, ConsoleNotifier};
use crate::output::{get_formatter, OutputFormat, OutputFormatter};

/// Error already shown to the user; `main` only sets the exit code
#[derive(Debug)]
pub struct Reported;

impl fmt::Display for Reported {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "command failed")
    }
}

impl std::error::Error for Reported {}

/// Loaded configuration plus global flags
pub struct AppContext {
    pub config: Config,
    pub config_path: PathBuf,
    pub format: OutputFormat,
    pub verbose: bool,
}

impl AppContext {
    /// Loads the config from `--config`, or the default path
    ///
    /// An explicit path must exist and parse; the default path falls back
    /// to built-in defaults.
    pub fn load(config_arg: Option<&str>, format: OutputFormat, verbose: bool) -> Result<Self> {
        let (config, config_path) = match config_arg {
            Some(path) => {
                let path = PathBuf::from(path);
                let config = Config::load(&path)
                    .with_context(|| format!("Failed to load configuration from {}", path.display()))?;
                (config, path)
            }
            None => {
                let path = Config::default_path();
                (Config::load_or_default(&path), path)
            }
        };
        Ok(Self {
            config,
            config_path,
            format,
            verbose,
        })
    }

    pub fn formatter(&self) -> Box<dyn OutputFormatter> {
        get_formatter(self.format.is_json())
    }

    pub fn cloud_store(&self) -> Arc<ApiCloudStore> {
        let client = SaveApiClient::from_config(&self.config.api, &self.config.transfer);
        debug!(base_url = client.base_url(), "Save store client ready");
        Arc::new(ApiCloudStore::new(client))
    }

    pub fn credential_store(&self) -> Arc<SettingsCredentialStore> {
        Arc::new(SettingsCredentialStore::new(self.config.credentials.file.clone()))
    }

    fn notifier(&self) -> Arc<ConsoleNotifier> {
        Arc::new(ConsoleNotifier::new(self.format, self.verbose))
    }

    /// Link controller over `store`
    pub fn link_controller(&self, store: Arc<ApiCloudStore>) -> LinkFlowController {
        LinkFlowController::new(
            store,
            self.credential_store(),
            Arc::new(ConsoleGameSession::new(self.format)),
            LinkSettings::from_config(&self.config.link),
        )
        .with_notifier(self.notifier())
    }

    /// Orchestrator over `store`
    pub fn orchestrator(&self, store: Arc<ApiCloudStore>) -> SyncOrchestrator {
        SyncOrchestrator::new(
            store,
            Arc::new(ZipArchiver::new(self.config.scratch_dir())),
            Arc::new(FsLocalSaves::new()),
            OrchestratorSettings::from_config(&self.config),
        )
        .with_notifier(self.notifier())
    }

    /// Store with the persisted credential loaded, or an error telling the
    /// user to link first
    pub fn linked_store(&self) -> Result<Arc<ApiCloudStore>> {
        let store = self.cloud_store();
        let restored = self
            .link_controller(Arc::clone(&store))
            .restore_credential()
            .map_err(|e| anyhow::anyhow!(e.user_message()))?;
        if !restored {
            anyhow::bail!("This device is not linked. Run 'savesync link' first.");
        }
        Ok(store)
    }
}
