//! Configuration management for folio-chat
//!
//! This module handles loading, parsing, validating, and managing
//! configuration from files, environment variables, and CLI overrides.
//! Precedence, lowest first: built-in defaults, YAML file, environment,
//! command line.

use crate::error::{FolioError, Result};
use crate::storage::HISTORY_DB_ENV;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Chat endpoint settings
    #[serde(default)]
    pub chat: ChatConfig,
    /// Conversation history storage settings
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Chat endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    /// URL the chat request is POSTed to
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Bearer token sent with every request
    #[serde(default)]
    pub api_key: Option<String>,

    /// Timeout for establishing the connection (seconds)
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_seconds: u64,

    /// Maximum wait for response headers or the next body chunk (seconds)
    #[serde(default = "default_stream_timeout")]
    pub stream_timeout_seconds: u64,
}

fn default_endpoint() -> String {
    "http://localhost:54321/functions/v1/portfolio-chat".to_string()
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_stream_timeout() -> u64 {
    60
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            api_key: None,
            connect_timeout_seconds: default_connect_timeout(),
            stream_timeout_seconds: default_stream_timeout(),
        }
    }
}

/// Conversation history storage configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory of the history database; the platform data dir when unset
    #[serde(default)]
    pub path: Option<PathBuf>,
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
        let contents = std::fs::read_to_string(path)
            .map_err(|e| FolioError::Config(format!("Failed to read config file: {}", e)))?;
        serde_yaml::from_str(&contents)
            .map_err(|e| FolioError::Config(format!("Failed to parse config: {}", e)).into())
    }

    fn apply_env_vars(&mut self) {
        if let Ok(endpoint) = std::env::var("FOLIO_CHAT_ENDPOINT") {
            self.chat.endpoint = endpoint;
        }

        if let Ok(api_key) = std::env::var("FOLIO_CHAT_API_KEY") {
            self.chat.api_key = Some(api_key);
        }

        if let Ok(timeout) = std::env::var("FOLIO_CONNECT_TIMEOUT_SECONDS") {
            if let Ok(value) = timeout.parse() {
                self.chat.connect_timeout_seconds = value;
            } else {
                tracing::warn!("Invalid FOLIO_CONNECT_TIMEOUT_SECONDS: {}", timeout);
            }
        }

        if let Ok(timeout) = std::env::var("FOLIO_STREAM_TIMEOUT_SECONDS") {
            if let Ok(value) = timeout.parse() {
                self.chat.stream_timeout_seconds = value;
            } else {
                tracing::warn!("Invalid FOLIO_STREAM_TIMEOUT_SECONDS: {}", timeout);
            }
        }

        if let Ok(db_path) = std::env::var(HISTORY_DB_ENV) {
            if !db_path.trim().is_empty() {
                tracing::debug!(path = %db_path, "Env override: {}", HISTORY_DB_ENV);
                self.storage.path = Some(PathBuf::from(db_path));
            }
        }
    }

    fn apply_cli_overrides(&mut self, cli: &crate::cli::Cli) {
        if let Some(path) = &cli.storage_path {
            self.storage.path = Some(PathBuf::from(path));
        }
    }

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns `FolioError::Config` if the endpoint is not an http(s) URL or a
    /// timeout is zero
    pub fn validate(&self) -> Result<()> {
        let endpoint = url::Url::parse(&self.chat.endpoint).map_err(|e| {
            FolioError::Config(format!(
                "chat.endpoint is not a valid URL ({}): {}",
                self.chat.endpoint, e
            ))
        })?;

        if !matches!(endpoint.scheme(), "http" | "https") {
            return Err(FolioError::Config(format!(
                "chat.endpoint must use http or https, got {}",
                endpoint.scheme()
            ))
            .into());
        }

        if self.chat.connect_timeout_seconds == 0 {
            return Err(FolioError::Config(
                "chat.connect_timeout_seconds must be greater than 0".to_string(),
            )
            .into());
        }

        if self.chat.stream_timeout_seconds == 0 {
            return Err(FolioError::Config(
                "chat.stream_timeout_seconds must be greater than 0".to_string(),
            )
            .into());
        }

        Ok(())
    }
}
