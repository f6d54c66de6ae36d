//! TOML Configuration File Support
//!
//! Settings are read from `~/.config/phantom-shell/config.toml`.
//!
//! # Configuration Priority
//!
//! Values are layered with the following priority (highest first):
//! 1. CLI arguments ([`ConfigOverrides`])
//! 2. Environment variables
//! 3. TOML configuration file
//! 4. Default values
//!
//! # Example Configuration
//!
//! ```toml
//! [session]
//! hostname = "prod-srv-42"
//! username = "root"
//! help_threshold = 3
//!
//! [interpreter]
//! frame_interval_ms = 80
//! scan_timeout_ms = 30000
//!
//! [keywords]
//! assistant = "agq"
//! file_manager = "mc"
//!
//! [backend]
//! ollama_host = "localhost"
//! ollama_port = 11434
//! model = "llama3.2"
//! scan_endpoint = "http://localhost:8080/scan"
//!
//! [storage]
//! path = "/var/lib/phantom-shell/state.json"
//! ephemeral = false
//! ```

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::interpreter::{InterpreterConfig, ScanPacing};
use crate::mode::Keywords;
use crate::session::SessionConfig;

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur when loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read config file
    #[error("Failed to read config file at {path}: {source}")]
    ReadError {
        /// The path that was attempted
        path: PathBuf,
        /// The underlying IO error
        source: std::io::Error,
    },

    /// Failed to parse TOML
    #[error("Failed to parse TOML config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

// =============================================================================
// Configuration Source Tracking
// =============================================================================

/// Tracks where a configuration value came from
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigSource {
    /// Value from command-line argument
    Cli,
    /// Value from environment variable
    Env,
    /// Value from TOML configuration file
    File,
    /// Default value
    Default,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cli => write!(f, "CLI"),
            Self::Env => write!(f, "environment"),
            Self::File => write!(f, "config file"),
            Self::Default => write!(f, "default"),
        }
    }
}

// =============================================================================
// TOML Configuration Structures
// =============================================================================

/// `[session]`
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionToml {
    /// Host name in the prompt
    pub hostname: Option<String>,
    /// User name in the prompt
    pub username: Option<String>,
    /// Starting directory
    pub home_dir: Option<String>,
    /// Consecutive misses before help is offered
    pub help_threshold: Option<u32>,
    /// Commands sent as model fallback context
    pub recent_commands: Option<usize>,
}

/// `[interpreter]`
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct InterpreterToml {
    /// Delay between animation frames
    pub frame_interval_ms: Option<u64>,
    /// Polling period of wait steps
    pub wait_poll_ms: Option<u64>,
    /// Shortest remote fetch display
    pub scan_min_duration_ms: Option<u64>,
    /// Duration assumed while a fetch is outstanding
    pub scan_assumed_max_ms: Option<u64>,
    /// Length of each calibration stage
    pub scan_calibration_stage_ms: Option<u64>,
    /// Give up on a fetch after this long (absent = wait forever)
    pub scan_timeout_ms: Option<u64>,
}

/// `[backend]`
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendToml {
    /// Ollama host
    pub ollama_host: Option<String>,
    /// Ollama port
    pub ollama_port: Option<u16>,
    /// Model name
    pub model: Option<String>,
    /// Remote fetch endpoint (absent = fetches fail fast)
    pub scan_endpoint: Option<String>,
    /// Model request timeout in seconds
    pub request_timeout_secs: Option<u64>,
}

/// `[storage]`
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageToml {
    /// State file location
    pub path: Option<PathBuf>,
    /// Keep state in memory only
    pub ephemeral: Option<bool>,
}

/// Top-level TOML configuration structure
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PhantomToml {
    /// `[session]`
    pub session: SessionToml,
    /// `[interpreter]`
    pub interpreter: InterpreterToml,
    /// `[keywords]`, merged over the defaults
    pub keywords: Option<Keywords>,
    /// `[backend]`
    pub backend: BackendToml,
    /// `[storage]`
    pub storage: StorageToml,
}

// =============================================================================
// Main Configuration Struct
// =============================================================================

/// Model and fetch endpoints
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BackendSettings {
    /// Ollama host
    pub ollama_host: String,
    /// Ollama port
    pub ollama_port: u16,
    /// Model name
    pub model: String,
    /// Remote fetch endpoint
    pub scan_endpoint: Option<String>,
    /// Model request timeout; scans are bounded by `interpreter.scan` instead
    pub request_timeout: Duration,
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            ollama_host: "localhost".to_string(),
            ollama_port: 11434,
            model: "llama3.2".to_string(),
            scan_endpoint: None,
            request_timeout: Duration::from_secs(120),
        }
    }
}

/// Where session state lives
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StorageSettings {
    /// State file; `None` uses the data directory default
    pub path: Option<PathBuf>,
    /// Keep state in memory only
    pub ephemeral: bool,
}

/// Resolved configuration
#[derive(Clone, Debug)]
pub struct PhantomConfig {
    /// Session settings
    pub session: SessionConfig,
    /// Interpreter timing
    pub interpreter: InterpreterConfig,
    /// Backend endpoints
    pub backend: BackendSettings,
    /// Storage location
    pub storage: StorageSettings,
    /// Path to the config file that was loaded (if any)
    pub config_file_path: Option<PathBuf>,
    source: ConfigSource,
}

impl Default for PhantomConfig {
    fn default() -> Self {
        Self {
            session: SessionConfig::default(),
            interpreter: InterpreterConfig::default(),
            backend: BackendSettings::default(),
            storage: StorageSettings::default(),
            config_file_path: None,
            source: ConfigSource::Default,
        }
    }
}

impl PhantomConfig {
    /// Configuration with default values
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Highest-priority source that contributed a value
    #[must_use]
    pub fn source(&self) -> ConfigSource {
        self.source
    }

    /// Check cross-field constraints
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ValidationError`] naming the offending value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.interpreter.frame_interval_ms == 0 {
            return Err(ConfigError::ValidationError(
                "interpreter.frame_interval_ms must be positive".to_string(),
            ));
        }
        if self.interpreter.wait_poll_ms == 0 {
            return Err(ConfigError::ValidationError(
                "interpreter.wait_poll_ms must be positive".to_string(),
            ));
        }
        if self.session.help_threshold == 0 {
            return Err(ConfigError::ValidationError(
                "session.help_threshold must be at least 1".to_string(),
            ));
        }
        if self.session.hostname.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "session.hostname must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

// =============================================================================
// Configuration Loading
// =============================================================================

/// `$XDG_CONFIG_HOME/phantom-shell/config.toml`
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("phantom-shell").join("config.toml"))
}

/// Load from the default path and the process environment
///
/// # Errors
///
/// Returns an error if the config file exists but cannot be parsed, or if the
/// result fails validation. A missing file is not an error.
pub fn load_config() -> Result<PhantomConfig, ConfigError> {
    load_config_from_path(default_config_path())
}

/// Load from `path` and the process environment
///
/// # Errors
///
/// See [`load_config`].
pub fn load_config_from_path(path: Option<PathBuf>) -> Result<PhantomConfig, ConfigError> {
    load_config_with_env(path, |key| std::env::var(key).ok())
}

/// Load from `path`, reading environment variables through `env`
///
/// # Errors
///
/// See [`load_config`].
pub fn load_config_with_env(
    path: Option<PathBuf>,
    env: impl Fn(&str) -> Option<String>,
) -> Result<PhantomConfig, ConfigError> {
    let mut config = PhantomConfig::default();

    if let Some(ref config_path) = path {
        if config_path.exists() {
            let toml_content =
                std::fs::read_to_string(config_path).map_err(|e| ConfigError::ReadError {
                    path: config_path.clone(),
                    source: e,
                })?;

            let toml_config: PhantomToml = toml::from_str(&toml_content)?;
            apply_toml_config(&mut config, toml_config);
            config.config_file_path = Some(config_path.clone());
            config.source = ConfigSource::File;

            tracing::info!(path = %config_path.display(), "Loaded configuration from file");
        } else {
            tracing::debug!(path = %config_path.display(), "Config file not found, using defaults");
        }
    }

    apply_env_config(&mut config, env);
    config.validate()?;
    Ok(config)
}

fn apply_toml_config(config: &mut PhantomConfig, toml: PhantomToml) {
    let session = &mut config.session;
    if let Some(hostname) = toml.session.hostname {
        session.hostname = hostname;
    }
    if let Some(username) = toml.session.username {
        session.username = username;
    }
    if let Some(home) = toml.session.home_dir {
        session.home_dir = home;
    }
    if let Some(threshold) = toml.session.help_threshold {
        session.help_threshold = threshold;
    }
    if let Some(n) = toml.session.recent_commands {
        session.recent_commands = n;
    }
    if let Some(keywords) = toml.keywords {
        session.keywords = keywords;
    }

    let interpreter = &mut config.interpreter;
    if let Some(ms) = toml.interpreter.frame_interval_ms {
        interpreter.frame_interval_ms = ms;
    }
    if let Some(ms) = toml.interpreter.wait_poll_ms {
        interpreter.wait_poll_ms = ms;
    }
    apply_scan_pacing(&mut interpreter.scan, &toml.interpreter);

    let backend = &mut config.backend;
    if let Some(host) = toml.backend.ollama_host {
        backend.ollama_host = host;
    }
    if let Some(port) = toml.backend.ollama_port {
        backend.ollama_port = port;
    }
    if let Some(model) = toml.backend.model {
        backend.model = model;
    }
    if toml.backend.scan_endpoint.is_some() {
        backend.scan_endpoint = toml.backend.scan_endpoint;
    }
    if let Some(secs) = toml.backend.request_timeout_secs {
        backend.request_timeout = Duration::from_secs(secs);
    }

    if toml.storage.path.is_some() {
        config.storage.path = toml.storage.path;
    }
    if let Some(ephemeral) = toml.storage.ephemeral {
        config.storage.ephemeral = ephemeral;
    }
}

fn apply_scan_pacing(scan: &mut ScanPacing, toml: &InterpreterToml) {
    if let Some(ms) = toml.scan_min_duration_ms {
        scan.min_duration_ms = ms;
    }
    if let Some(ms) = toml.scan_assumed_max_ms {
        scan.assumed_max_ms = ms;
    }
    if let Some(ms) = toml.scan_calibration_stage_ms {
        scan.calibration_stage_ms = ms;
    }
    if toml.scan_timeout_ms.is_some() {
        scan.timeout_ms = toml.scan_timeout_ms;
    }
}

fn apply_env_config(config: &mut PhantomConfig, env: impl Fn(&str) -> Option<String>) {
    if let Some(host) = env("OLLAMA_HOST") {
        config.backend.ollama_host = host;
        config.source = ConfigSource::Env;
    }
    if let Some(port) = env("OLLAMA_PORT") {
        match port.parse::<u16>() {
            Ok(port) => {
                config.backend.ollama_port = port;
                config.source = ConfigSource::Env;
            }
            Err(e) => tracing::warn!(value = %port, error = %e, "Ignoring invalid OLLAMA_PORT"),
        }
    }
    if let Some(model) = env("PHANTOM_MODEL") {
        config.backend.model = model;
        config.source = ConfigSource::Env;
    }
    if let Some(endpoint) = env("PHANTOM_SCAN_ENDPOINT") {
        config.backend.scan_endpoint = Some(endpoint);
        config.source = ConfigSource::Env;
    }
    if let Some(timeout) = env("PHANTOM_SCAN_TIMEOUT_MS") {
        if let Ok(ms) = timeout.parse::<u64>() {
            config.interpreter.scan.timeout_ms = Some(ms);
            config.source = ConfigSource::Env;
        }
    }
    if let Some(hostname) = env("PHANTOM_HOSTNAME") {
        config.session.hostname = hostname;
        config.source = ConfigSource::Env;
    }
    if let Some(path) = env("PHANTOM_STATE_FILE") {
        config.storage.path = Some(PathBuf::from(path));
        config.source = ConfigSource::Env;
    }
    if let Some(ephemeral) = env("PHANTOM_EPHEMERAL") {
        config.storage.ephemeral = ephemeral != "0" && ephemeral.to_lowercase() != "false";
        config.source = ConfigSource::Env;
    }
}

// =============================================================================
// CLI Override Support
// =============================================================================

/// Command-line overrides, applied after [`load_config`]
#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    /// Host name override
    pub hostname: Option<String>,
    /// Model override
    pub model: Option<String>,
    /// Scan endpoint override
    pub scan_endpoint: Option<String>,
    /// State file override
    pub state_file: Option<PathBuf>,
    /// Keep state in memory only
    pub ephemeral: Option<bool>,
}

impl ConfigOverrides {
    /// Create a new empty set of overrides
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set host name override
    #[must_use]
    pub fn with_hostname(mut self, hostname: String) -> Self {
        self.hostname = Some(hostname);
        self
    }

    /// Set model override
    #[must_use]
    pub fn with_model(mut self, model: String) -> Self {
        self.model = Some(model);
        self
    }

    /// Set scan endpoint override
    #[must_use]
    pub fn with_scan_endpoint(mut self, endpoint: String) -> Self {
        self.scan_endpoint = Some(endpoint);
        self
    }

    /// Set state file override
    #[must_use]
    pub fn with_state_file(mut self, path: PathBuf) -> Self {
        self.state_file = Some(path);
        self
    }

    /// Set ephemeral override
    #[must_use]
    pub fn with_ephemeral(mut self, ephemeral: bool) -> Self {
        self.ephemeral = Some(ephemeral);
        self
    }

    fn is_empty(&self) -> bool {
        self.hostname.is_none()
            && self.model.is_none()
            && self.scan_endpoint.is_none()
            && self.state_file.is_none()
            && self.ephemeral.is_none()
    }

    /// Apply overrides to a configuration
    pub fn apply(&self, config: &mut PhantomConfig) {
        if self.is_empty() {
            return;
        }
        config.source = ConfigSource::Cli;

        if let Some(ref hostname) = self.hostname {
            config.session.hostname.clone_from(hostname);
        }
        if let Some(ref model) = self.model {
            config.backend.model.clone_from(model);
        }
        if let Some(ref endpoint) = self.scan_endpoint {
            config.backend.scan_endpoint = Some(endpoint.clone());
        }
        if let Some(ref path) = self.state_file {
            config.storage.path = Some(path.clone());
        }
        if let Some(ephemeral) = self.ephemeral {
            config.storage.ephemeral = ephemeral;
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
