//! TOML Configuration File Support
//!
//! Centralized configuration loading for mealagent, supporting a TOML file
//! at `~/.config/mealagent/mealagent.toml`.
//!
//! # Configuration Priority
//!
//! Configuration values are loaded with the following priority (highest first):
//! 1. CLI arguments (applied by the caller through [`ConfigOverrides`])
//! 2. Environment variables
//! 3. TOML configuration file
//! 4. Default values
//!
//! # XDG Base Directory Compliance
//!
//! - `$XDG_CONFIG_HOME/mealagent/mealagent.toml` for configuration
//! - `$XDG_DATA_HOME/mealagent/threads` for checkpoints (default)
//!
//! # Example Configuration
//!
//! ```toml
//! [backend]
//! provider = "ollama"
//! host = "localhost"
//! port = 11434
//! model = "llava"
//! timeout_secs = 120
//! temperature = 0.2
//!
//! [workflow]
//! max_steps = 64
//!
//! [checkpoint]
//! dir = "/var/lib/mealagent/threads"
//!
//! [logging]
//! filter = "mealagent=debug,mealagent_core=debug"
//! ```
//!
//! # Environment Variables
//!
//! | Variable                   | Overrides              |
//! |----------------------------|------------------------|
//! | `MEALAGENT_PROVIDER`       | `backend.provider`     |
//! | `MEALAGENT_MODEL`          | `backend.model`        |
//! | `OLLAMA_HOST`              | `backend.host`         |
//! | `OLLAMA_PORT`              | `backend.port`         |
//! | `OPENAI_API_KEY`           | `backend.api_key`      |
//! | `MEALAGENT_BASE_URL`       | `backend.base_url`     |
//! | `MEALAGENT_MAX_STEPS`      | `workflow.max_steps`   |
//! | `MEALAGENT_CHECKPOINT_DIR` | `checkpoint.dir`       |
//! | `MEALAGENT_LOG`            | `logging.filter`       |

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::backend::BackendConfig;
use crate::workflow::{default_checkpoint_dir, WorkflowConfig, DEFAULT_MAX_STEPS};

/// Model requested when none is configured
pub const DEFAULT_MODEL: &str = "llava";

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

/// Backend section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendToml {
    /// `ollama` or `openai`
    pub provider: Option<String>,

    /// Ollama host
    pub host: Option<String>,

    /// Ollama port
    pub port: Option<u16>,

    /// Vision-capable model name
    pub model: Option<String>,

    /// API key for OpenAI-compatible providers
    pub api_key: Option<String>,

    /// Base URL for OpenAI-compatible providers
    pub base_url: Option<String>,

    /// Request timeout in seconds
    pub timeout_secs: Option<u64>,

    /// Sampling temperature
    pub temperature: Option<f32>,
}

/// Workflow section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowToml {
    /// Node executions allowed per invocation
    pub max_steps: Option<usize>,
}

/// Checkpoint section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckpointToml {
    /// Directory for thread checkpoint files
    pub dir: Option<PathBuf>,
}

/// Logging section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingToml {
    /// `tracing_subscriber::EnvFilter` directives
    pub filter: Option<String>,
}

/// Top-level TOML configuration structure
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MealAgentToml {
    /// Backend configuration section
    pub backend: BackendToml,

    /// Workflow configuration section
    pub workflow: WorkflowToml,

    /// Checkpoint configuration section
    pub checkpoint: CheckpointToml,

    /// Logging configuration section
    pub logging: LoggingToml,
}

// =============================================================================
// Main Configuration Struct
// =============================================================================

/// Effective mealagent configuration
///
/// Use [`load_config`] to build one with proper priority handling, then
/// apply CLI flags with [`ConfigOverrides::apply`].
#[derive(Clone, Debug)]
pub struct MealAgentConfig {
    /// `ollama` or `openai`
    pub provider: String,

    /// Ollama host
    pub host: String,

    /// Ollama port
    pub port: u16,

    /// Model name sent with every request
    pub model: String,

    /// API key for OpenAI-compatible providers
    pub api_key: Option<String>,

    /// Base URL override for OpenAI-compatible providers
    pub base_url: Option<String>,

    /// Backend request timeout
    pub request_timeout: Duration,

    /// Sampling temperature
    pub temperature: f32,

    /// Node executions allowed per invocation
    pub max_steps: usize,

    /// Directory for thread checkpoint files
    pub checkpoint_dir: PathBuf,

    /// Log filter directives, if configured
    pub log_filter: Option<String>,

    /// Path to the config file that was loaded (if any)
    pub config_file_path: Option<PathBuf>,

    /// Source of configuration values
    source: ConfigSource,
}

impl Default for MealAgentConfig {
    fn default() -> Self {
        Self {
            provider: "ollama".to_string(),
            host: "localhost".to_string(),
            port: 11434,
            model: DEFAULT_MODEL.to_string(),
            api_key: None,
            base_url: None,
            request_timeout: Duration::from_secs(120),
            temperature: 0.2,
            max_steps: DEFAULT_MAX_STEPS,
            checkpoint_dir: default_checkpoint_dir(),
            log_filter: None,
            config_file_path: None,
            source: ConfigSource::Default,
        }
    }
}

impl MealAgentConfig {
    /// Create a new configuration with default values
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the primary source of this configuration
    #[must_use]
    pub fn source(&self) -> ConfigSource {
        self.source
    }

    /// Set the configuration source
    pub fn set_source(&mut self, source: ConfigSource) {
        self.source = source;
    }

    /// Backend connection described by this configuration
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ValidationError`] for an unknown provider or an
    /// OpenAI provider without an API key.
    pub fn backend_config(&self) -> Result<BackendConfig, ConfigError> {
        match self.provider.to_ascii_lowercase().as_str() {
            "ollama" => Ok(BackendConfig::ollama(self.host.clone(), self.port)),
            "openai" => {
                let api_key = self
                    .api_key
                    .clone()
                    .filter(|key| !key.trim().is_empty())
                    .ok_or_else(|| {
                        ConfigError::ValidationError(
                            "provider \"openai\" requires an API key (OPENAI_API_KEY)".to_string(),
                        )
                    })?;
                Ok(BackendConfig::OpenAI {
                    api_key,
                    base_url: self.base_url.clone(),
                })
            }
            other => Err(ConfigError::ValidationError(format!(
                "unknown backend provider {other:?} (expected \"ollama\" or \"openai\")"
            ))),
        }
    }

    /// Runner limits described by this configuration
    #[must_use]
    pub fn workflow_config(&self) -> WorkflowConfig {
        WorkflowConfig {
            max_steps: self.max_steps,
        }
    }
}

// =============================================================================
// Configuration Loading
// =============================================================================

/// Get the default configuration file path
///
/// Returns `$XDG_CONFIG_HOME/mealagent/mealagent.toml` or
/// `~/.config/mealagent/mealagent.toml` if `XDG_CONFIG_HOME` is not set.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("mealagent").join("mealagent.toml"))
}

/// Load configuration from all sources with proper priority
///
/// # Errors
///
/// Returns an error if the config file exists but cannot be parsed.
/// A missing config file is not an error (defaults are used).
pub fn load_config() -> Result<MealAgentConfig, ConfigError> {
    load_config_from_path(default_config_path())
}

/// Load configuration from a specific path
///
/// If `path` is `None`, only defaults and environment variables are used.
///
/// # Errors
///
/// Returns an error if the specified config file cannot be read or parsed,
/// or if a value is out of range.
pub fn load_config_from_path(path: Option<PathBuf>) -> Result<MealAgentConfig, ConfigError> {
    load_config_with_env(path, |key| std::env::var(key).ok())
}

/// Load configuration reading environment variables through `env`
fn load_config_with_env<F>(path: Option<PathBuf>, env: F) -> Result<MealAgentConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = MealAgentConfig::default();

    if let Some(ref config_path) = path {
        if config_path.exists() {
            let toml_content =
                std::fs::read_to_string(config_path).map_err(|e| ConfigError::ReadError {
                    path: config_path.clone(),
                    source: e,
                })?;

            let toml_config: MealAgentToml = toml::from_str(&toml_content)?;
            apply_toml_config(&mut config, &toml_config);
            config.config_file_path = Some(config_path.clone());
            config.source = ConfigSource::File;

            tracing::info!(
                path = %config_path.display(),
                "Loaded configuration from file"
            );
        } else {
            tracing::debug!(
                path = %config_path.display(),
                "Config file not found, using defaults"
            );
        }
    }

    apply_env_config(&mut config, env);
    validate(&config)?;

    Ok(config)
}

fn apply_toml_config(config: &mut MealAgentConfig, toml: &MealAgentToml) {
    // Backend
    if let Some(provider) = &toml.backend.provider {
        config.provider = provider.clone();
    }
    if let Some(host) = &toml.backend.host {
        config.host = host.clone();
    }
    if let Some(port) = toml.backend.port {
        config.port = port;
    }
    if let Some(model) = &toml.backend.model {
        config.model = model.clone();
    }
    if toml.backend.api_key.is_some() {
        config.api_key = toml.backend.api_key.clone();
    }
    if toml.backend.base_url.is_some() {
        config.base_url = toml.backend.base_url.clone();
    }
    if let Some(secs) = toml.backend.timeout_secs {
        config.request_timeout = Duration::from_secs(secs);
    }
    if let Some(temperature) = toml.backend.temperature {
        config.temperature = temperature;
    }

    // Workflow
    if let Some(max_steps) = toml.workflow.max_steps {
        config.max_steps = max_steps;
    }

    // Checkpoints
    if let Some(dir) = &toml.checkpoint.dir {
        config.checkpoint_dir = dir.clone();
    }

    // Logging
    if toml.logging.filter.is_some() {
        config.log_filter = toml.logging.filter.clone();
    }
}

fn apply_env_config<F>(config: &mut MealAgentConfig, env: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(provider) = env("MEALAGENT_PROVIDER") {
        config.provider = provider;
        config.source = ConfigSource::Env;
    }
    if let Some(model) = env("MEALAGENT_MODEL") {
        config.model = model;
        config.source = ConfigSource::Env;
    }
    if let Some(host) = env("OLLAMA_HOST") {
        config.host = host;
        config.source = ConfigSource::Env;
    }
    if let Some(port) = env("OLLAMA_PORT") {
        if let Ok(port) = port.parse::<u16>() {
            config.port = port;
            config.source = ConfigSource::Env;
        } else {
            tracing::warn!(value = %port, "Ignoring invalid OLLAMA_PORT");
        }
    }
    if let Some(key) = env("OPENAI_API_KEY") {
        config.api_key = Some(key);
        config.source = ConfigSource::Env;
    }
    if let Some(url) = env("MEALAGENT_BASE_URL") {
        config.base_url = Some(url);
        config.source = ConfigSource::Env;
    }
    if let Some(steps) = env("MEALAGENT_MAX_STEPS") {
        if let Ok(n) = steps.parse::<usize>() {
            config.max_steps = n;
            config.source = ConfigSource::Env;
        } else {
            tracing::warn!(value = %steps, "Ignoring invalid MEALAGENT_MAX_STEPS");
        }
    }
    if let Some(dir) = env("MEALAGENT_CHECKPOINT_DIR") {
        config.checkpoint_dir = PathBuf::from(dir);
        config.source = ConfigSource::Env;
    }
    if let Some(filter) = env("MEALAGENT_LOG") {
        config.log_filter = Some(filter);
        config.source = ConfigSource::Env;
    }
}

fn validate(config: &MealAgentConfig) -> Result<(), ConfigError> {
    if config.max_steps == 0 {
        return Err(ConfigError::ValidationError(
            "workflow.max_steps must be at least 1".to_string(),
        ));
    }
    if !(0.0..=1.0).contains(&config.temperature) {
        return Err(ConfigError::ValidationError(format!(
            "backend.temperature must be between 0.0 and 1.0, got {}",
            config.temperature
        )));
    }
    if config.model.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "backend.model must not be empty".to_string(),
        ));
    }
    Ok(())
}

// =============================================================================
// CLI Overrides
// =============================================================================

/// Configuration overrides from CLI arguments
#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    /// Backend provider override
    pub provider: Option<String>,
    /// Model override
    pub model: Option<String>,
    /// Step limit override
    pub max_steps: Option<usize>,
    /// Checkpoint directory override
    pub checkpoint_dir: Option<PathBuf>,
    /// Log filter override
    pub log_filter: Option<String>,
}

impl ConfigOverrides {
    /// Create empty overrides
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set provider override
    #[must_use]
    pub fn with_provider(mut self, provider: String) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Set model override
    #[must_use]
    pub fn with_model(mut self, model: String) -> Self {
        self.model = Some(model);
        self
    }

    /// Set step limit override
    #[must_use]
    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = Some(max_steps);
        self
    }

    /// Set checkpoint directory override
    #[must_use]
    pub fn with_checkpoint_dir(mut self, dir: PathBuf) -> Self {
        self.checkpoint_dir = Some(dir);
        self
    }

    /// Set log filter override
    #[must_use]
    pub fn with_log_filter(mut self, filter: String) -> Self {
        self.log_filter = Some(filter);
        self
    }

    /// Apply overrides to a configuration
    pub fn apply(&self, config: &mut MealAgentConfig) {
        let mut applied = false;

        if let Some(provider) = &self.provider {
            config.provider = provider.clone();
            applied = true;
        }
        if let Some(model) = &self.model {
            config.model = model.clone();
            applied = true;
        }
        if let Some(max_steps) = self.max_steps {
            config.max_steps = max_steps;
            applied = true;
        }
        if let Some(dir) = &self.checkpoint_dir {
            config.checkpoint_dir = dir.clone();
            applied = true;
        }
        if let Some(filter) = &self.log_filter {
            config.log_filter = Some(filter.clone());
            applied = true;
        }

        if applied {
            config.source = ConfigSource::Cli;
        }
    }
}
