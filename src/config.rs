//! Configuration management for docchat
//!
//! This module handles loading, parsing, validating, and managing
//! configuration from files, environment variables, and CLI overrides.

use crate::error::{DocchatError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration structure for docchat
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Remote assistant service settings
    #[serde(default)]
    pub backend: BackendConfig,
    /// Conversation behavior settings
    #[serde(default)]
    pub chat: ChatConfig,
    /// Local persistence settings
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Remote assistant service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Base URL of the assistant service (without the `/api` suffix)
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Transport-level timeout applied by the HTTP client (seconds)
    #[serde(default = "default_transport_timeout")]
    pub timeout_seconds: u64,

    /// User agent sent with every request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_base_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_transport_timeout() -> u64 {
    60
}

fn default_user_agent() -> String {
    format!("docchat/{}", env!("CARGO_PKG_VERSION"))
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_seconds: default_transport_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

/// Conversation behavior configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    /// Prompt sent when bootstrapping a new session
    #[serde(default = "default_welcome_message")]
    pub welcome_message: String,

    /// Assistant text appended when an exchange fails
    #[serde(default = "default_error_message")]
    pub error_message: String,

    /// Course identifier forwarded in the request context
    #[serde(default = "default_course")]
    pub course: String,

    /// Page identifier used until the surface reports one
    #[serde(default = "default_page")]
    pub default_page: String,

    /// Deadline for a single exchange with the backend (seconds)
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,

    /// Create a session before sending when none exists yet
    #[serde(default = "default_retry_session")]
    pub retry_session_before_send: bool,
}

fn default_welcome_message() -> String {
    "Hello, I am ready to help you with questions about the Physical AI & Humanoid Robotics textbook."
        .to_string()
}

fn default_error_message() -> String {
    "Sorry, I encountered an error processing your request. Please try again.".to_string()
}

fn default_course() -> String {
    "physical-ai-humanoid-robotics".to_string()
}

fn default_page() -> String {
    "/".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

fn default_retry_session() -> bool {
    true
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            welcome_message: default_welcome_message(),
            error_message: default_error_message(),
            course: default_course(),
            default_page: default_page(),
            request_timeout_seconds: default_request_timeout(),
            retry_session_before_send: default_retry_session(),
        }
    }
}

/// Local persistence configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Path of the sled database; defaults to the platform data directory
    #[serde(default)]
    pub path: Option<PathBuf>,

    /// Keep everything in memory; nothing survives a restart
    #[serde(default)]
    pub ephemeral: bool,
}

impl Config {
    /// Load configuration from file with environment and CLI overrides
    ///
    /// A missing file is not an error; defaults are used instead.
    ///
    /// # Errors
    ///
    /// Returns error if the file exists but cannot be read or parsed
    pub fn load(path: &str, cli: &crate::cli::Cli) -> Result<Self> {
        let mut config = if Path::new(path).exists() {
            Self::from_file(path)?
        } else {
            tracing::warn!("Config file not found at {}, using defaults", path);
            Self::default()
        };

        config.apply_env_vars();
        config.apply_cli_overrides(cli);

        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(DocchatError::from)?;
        let config = serde_yaml::from_str(&contents).map_err(DocchatError::from)?;
        Ok(config)
    }

    fn apply_env_vars(&mut self) {
        if let Ok(base_url) = std::env::var("DOCCHAT_BACKEND_URL") {
            self.backend.base_url = base_url;
        }

        if let Ok(timeout) = std::env::var("DOCCHAT_TIMEOUT_SECONDS") {
            match timeout.parse::<u64>() {
                Ok(secs) => self.chat.request_timeout_seconds = secs,
                Err(_) => tracing::warn!("Ignoring invalid DOCCHAT_TIMEOUT_SECONDS: {}", timeout),
            }
        }

        if let Ok(course) = std::env::var("DOCCHAT_COURSE") {
            self.chat.course = course;
        }

        if let Ok(storage_path) = std::env::var("DOCCHAT_STORAGE_PATH") {
            self.storage.path = Some(PathBuf::from(storage_path));
        }
    }

    fn apply_cli_overrides(&mut self, cli: &crate::cli::Cli) {
        if let Some(base_url) = &cli.backend_url {
            self.backend.base_url = base_url.clone();
        }

        if let Some(storage_path) = &cli.storage_path {
            tracing::info!("Using storage override from CLI: {}", storage_path);
            self.storage.path = Some(PathBuf::from(storage_path));
        }

        if cli.verbose {
            tracing::debug!("Verbose mode enabled");
        }
    }

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns error if any validation check fails
    pub fn validate(&self) -> Result<()> {
        let base_url = url::Url::parse(&self.backend.base_url).map_err(|e| {
            DocchatError::Config(format!(
                "Invalid backend.base_url '{}': {}",
                self.backend.base_url, e
            ))
        })?;

        if !matches!(base_url.scheme(), "http" | "https") {
            return Err(DocchatError::Config(format!(
                "backend.base_url must use http or https, got: {}",
                base_url.scheme()
            ))
            .into());
        }

        if self.backend.timeout_seconds == 0 {
            return Err(DocchatError::Config(
                "backend.timeout_seconds must be greater than 0".to_string(),
            )
            .into());
        }

        if self.chat.request_timeout_seconds == 0 {
            return Err(DocchatError::Config(
                "chat.request_timeout_seconds must be greater than 0".to_string(),
            )
            .into());
        }

        if self.chat.welcome_message.trim().is_empty() {
            return Err(
                DocchatError::Config("chat.welcome_message cannot be empty".to_string()).into(),
            );
        }

        if self.chat.error_message.trim().is_empty() {
            return Err(
                DocchatError::Config("chat.error_message cannot be empty".to_string()).into(),
            );
        }

        Ok(())
    }
}
