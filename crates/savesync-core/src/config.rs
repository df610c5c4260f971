//! Configuration module for SaveSync.
//!
//! Typed view of `config.yaml`: store endpoint, saves directory, transfer
//! tuning, link polling, logging and the credential file. Every section
//! falls back to its defaults, so a partial file is enough.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default remote API base URL
pub const DEFAULT_BASE_URL: &str = "https://localhost:7282/api/SaveManagerAPI";

/// Default header carrying the credential
pub const DEFAULT_CREDENTIAL_HEADER: &str = "X-Save-Key";

/// Name of the settings file holding the encrypted credential
pub const SETTINGS_FILE_NAME: &str = "save-manager-settings.json";

// ---------------------------------------------------------------------------
// Config struct with sub-sections
// ---------------------------------------------------------------------------

/// Top-level configuration for SaveSync.
///
/// Every section falls back to its defaults when omitted from the file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api: ApiConfig,
    pub saves: SavesConfig,
    pub transfer: TransferConfig,
    pub link: LinkConfig,
    pub logging: LoggingConfig,
    pub credentials: CredentialsConfig,
}

/// Remote save store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Base URL of the save API, without a trailing slash.
    pub base_url: String,
    /// Header name used to send the credential.
    pub credential_header: String,
    /// Per-request timeout for JSON calls, in seconds. Transfers are not capped.
    pub timeout_secs: u64,
}

/// Local saves settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SavesConfig {
    /// Directory holding one subdirectory per world.
    pub root: PathBuf,
    /// Where temporary archives are written. `None` uses the system temp dir.
    pub scratch_dir: Option<PathBuf>,
    /// File names never packed into an archive (matched case-insensitively).
    pub exclude: Vec<String>,
}

/// Streaming and progress settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferConfig {
    /// Upload chunk size, in KiB.
    pub buffer_size_kb: u64,
    /// Minimum spacing between throughput samples, in milliseconds.
    pub min_sample_ms: u64,
    /// Weight of the newest sample in the smoothed rate (0, 1].
    pub smoothing: f64,
}

/// Device-link settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    /// Seconds between status polls.
    pub poll_interval_secs: u64,
    /// Server joined for the in-game handshake.
    pub server_address: String,
    /// Delay before retrying the handshake when the session isn't ready, in milliseconds.
    pub handshake_retry_delay_ms: u64,
    /// Delay between disconnecting and reporting completion, in milliseconds.
    pub settle_delay_ms: u64,
    /// Open the approval URL in the default browser.
    pub open_browser: bool,
}

/// `tracing` output.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive when neither `RUST_LOG` nor `-v` is given.
    pub level: String,
}

/// Credential persistence settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CredentialsConfig {
    /// Path of the JSON settings file holding the encrypted credential.
    pub file: PathBuf,
}

// ---------------------------------------------------------------------------
// Config::load()
// ---------------------------------------------------------------------------

impl Config {
    /// Reads and parses the YAML file at `path`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Like [`Config::load`], but a missing or broken file yields the defaults.
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_default()
    }

    /// `<config dir>/savesync/config.yaml`
    ///
    /// Typically `$XDG_CONFIG_HOME/savesync/config.yaml` on Linux.
    pub fn default_path() -> PathBuf {
        config_dir().join("config.yaml")
    }

    /// Directory used for scratch archives.
    pub fn scratch_dir(&self) -> PathBuf {
        self.saves
            .scratch_dir
            .clone()
            .unwrap_or_else(std::env::temp_dir)
    }
}

fn config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("~/.config"))
        .join("savesync")
}

impl TransferConfig {
    pub fn buffer_size(&self) -> usize {
        (self.buffer_size_kb.max(1) * 1024) as usize
    }

    pub fn min_sample_interval(&self) -> Duration {
        Duration::from_millis(self.min_sample_ms)
    }
}

impl LinkConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }

    pub fn handshake_retry_delay(&self) -> Duration {
        Duration::from_millis(self.handshake_retry_delay_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}

// ---------------------------------------------------------------------------
// Config::default()
// ---------------------------------------------------------------------------

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            credential_header: DEFAULT_CREDENTIAL_HEADER.to_string(),
            timeout_secs: 30,
        }
    }
}

impl Default for SavesConfig {
    fn default() -> Self {
        Self {
            root: dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("~/.local/share"))
                .join("savesync")
                .join("saves"),
            scratch_dir: None,
            exclude: vec!["session.lock".to_string()],
        }
    }
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            buffer_size_kb: 64,
            min_sample_ms: 50,
            smoothing: 0.2,
        }
    }
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 2,
            server_address: "link.savesync.net".to_string(),
            handshake_retry_delay_ms: 1500,
            settle_delay_ms: 1000,
            open_browser: true,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        Self {
            file: config_dir().join(SETTINGS_FILE_NAME),
        }
    }
}

// ---------------------------------------------------------------------------
// Config::validate()
// ---------------------------------------------------------------------------

/// One problem reported by [`Config::validate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path to the offending field, e.g. `"link.poll_interval_secs"`.
    pub field: String,
    /// What is wrong with the value.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Valid values for `logging.level`.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

impl Config {
    /// Checks every field and collects all problems; empty means valid.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        // --- api ---
        match url_scheme(&self.api.base_url) {
            Some("http") | Some("https") => {}
            _ => errors.push(ValidationError {
                field: "api.base_url".into(),
                message: format!("must be an http(s) URL, got '{}'", self.api.base_url),
            }),
        }
        if self.api.base_url.ends_with('/') {
            errors.push(ValidationError {
                field: "api.base_url".into(),
                message: "must not end with '/'".into(),
            });
        }
        if self.api.credential_header.trim().is_empty() {
            errors.push(ValidationError {
                field: "api.credential_header".into(),
                message: "must not be empty".into(),
            });
        }
        if self.api.timeout_secs == 0 {
            errors.push(ValidationError {
                field: "api.timeout_secs".into(),
                message: "must be greater than 0".into(),
            });
        }

        // --- saves ---
        if self.saves.root.as_os_str().is_empty() {
            errors.push(ValidationError {
                field: "saves.root".into(),
                message: "must not be empty".into(),
            });
        }
        if let Some(scratch) = &self.saves.scratch_dir {
            if !scratch.is_dir() {
                errors.push(ValidationError {
                    field: "saves.scratch_dir".into(),
                    message: format!("directory does not exist: {}", scratch.display()),
                });
            }
        }
        if self.saves.exclude.iter().any(|name| name.contains('/')) {
            errors.push(ValidationError {
                field: "saves.exclude".into(),
                message: "entries are file names and must not contain '/'".into(),
            });
        }

        // --- transfer ---
        if self.transfer.buffer_size_kb == 0 || self.transfer.buffer_size_kb > 16 * 1024 {
            errors.push(ValidationError {
                field: "transfer.buffer_size_kb".into(),
                message: "must be in range 1..=16384".into(),
            });
        }
        if !(self.transfer.smoothing > 0.0 && self.transfer.smoothing <= 1.0) {
            errors.push(ValidationError {
                field: "transfer.smoothing".into(),
                message: "must be in range (0, 1]".into(),
            });
        }

        // --- link ---
        if self.link.poll_interval_secs == 0 {
            errors.push(ValidationError {
                field: "link.poll_interval_secs".into(),
                message: "must be greater than 0".into(),
            });
        }
        if self.link.server_address.trim().is_empty() {
            errors.push(ValidationError {
                field: "link.server_address".into(),
                message: "must not be empty".into(),
            });
        }

        // --- logging ---
        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            errors.push(ValidationError {
                field: "logging.level".into(),
                message: format!(
                    "invalid level '{}'; valid options: {}",
                    self.logging.level,
                    VALID_LOG_LEVELS.join(", ")
                ),
            });
        }

        // --- credentials ---
        if self.credentials.file.file_name().is_none() {
            errors.push(ValidationError {
                field: "credentials.file".into(),
                message: "must point to a file".into(),
            });
        }

        errors
    }
}

fn url_scheme(url: &str) -> Option<&str> {
    let (scheme, rest) = url.split_once("://")?;
    if rest.is_empty() {
        return None;
    }
    Some(scheme)
}

// ---------------------------------------------------------------------------
// ConfigBuilder
// ---------------------------------------------------------------------------

/// Programmatic [`Config`] construction on top of the defaults.
///
/// # Example
///
/// ```rust,no_run
/// use savesync_core::config::ConfigBuilder;
/// use std::path::PathBuf;
///
/// let config = ConfigBuilder::new()
///     .saves_root(PathBuf::from("/home/user/.minecraft/saves"))
///     .api_base_url("https://saves.example.com/api/SaveManagerAPI")
///     .logging_level("debug")
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Starts from [`Config::default`].
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    // --- api ---

    pub fn api_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.api.base_url = url.into();
        self
    }

    pub fn api_credential_header(mut self, header: impl Into<String>) -> Self {
        self.config.api.credential_header = header.into();
        self
    }

    pub fn api_timeout_secs(mut self, seconds: u64) -> Self {
        self.config.api.timeout_secs = seconds;
        self
    }

    // --- saves ---

    pub fn saves_root(mut self, root: PathBuf) -> Self {
        self.config.saves.root = root;
        self
    }

    pub fn saves_scratch_dir(mut self, dir: PathBuf) -> Self {
        self.config.saves.scratch_dir = Some(dir);
        self
    }

    pub fn saves_exclude(mut self, names: Vec<String>) -> Self {
        self.config.saves.exclude = names;
        self
    }

    // --- transfer ---

    pub fn transfer_buffer_size_kb(mut self, kb: u64) -> Self {
        self.config.transfer.buffer_size_kb = kb;
        self
    }

    pub fn transfer_min_sample_ms(mut self, ms: u64) -> Self {
        self.config.transfer.min_sample_ms = ms;
        self
    }

    pub fn transfer_smoothing(mut self, alpha: f64) -> Self {
        self.config.transfer.smoothing = alpha;
        self
    }

    // --- link ---

    pub fn link_poll_interval_secs(mut self, seconds: u64) -> Self {
        self.config.link.poll_interval_secs = seconds;
        self
    }

    pub fn link_server_address(mut self, address: impl Into<String>) -> Self {
        self.config.link.server_address = address.into();
        self
    }

    pub fn link_handshake_retry_delay_ms(mut self, ms: u64) -> Self {
        self.config.link.handshake_retry_delay_ms = ms;
        self
    }

    pub fn link_settle_delay_ms(mut self, ms: u64) -> Self {
        self.config.link.settle_delay_ms = ms;
        self
    }

    pub fn link_open_browser(mut self, open: bool) -> Self {
        self.config.link.open_browser = open;
        self
    }

    // --- logging ---

    pub fn logging_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    // --- credentials ---

    pub fn credentials_file(mut self, file: PathBuf) -> Self {
        self.config.credentials.file = file;
        self
    }

    // --- build ---

    /// Returns the assembled [`Config`].
    pub fn build(self) -> Config {
        self.config
    }

    /// [`ConfigBuilder::build`] followed by [`Config::validate`].
    pub fn build_validated(self) -> Result<Config, Vec<ValidationError>> {
        let config = self.build();
        let errors = config.validate();
        if errors.is_empty() {
            Ok(config)
        } else {
            Err(errors)
        }
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
