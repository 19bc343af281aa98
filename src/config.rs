//! Configuration management for shell-relay.
//!
//! Configuration is loaded with the following priority (highest to lowest):
//! 1. Command-line arguments
//! 2. Environment variables
//! 3. Configuration file (JSON)
//! 4. Default values

use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::api::{AppState, ServerConfig, DEFAULT_PORT};
use crate::cli::Args;
use crate::execution::{CommandRunner, Shell};

/// Application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Server configuration.
    pub server: ServerSection,
    /// Command execution configuration.
    pub execution: ExecutionSection,
    /// Logging configuration.
    pub logging: LoggingSection,
}

/// Server configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    /// Host address to bind to.
    pub host: String,
    /// Port to listen on.
    pub port: u16,
    /// Wait for in-flight calls on shutdown.
    pub graceful_shutdown: bool,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
            graceful_shutdown: false,
        }
    }
}

/// Command execution section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionSection {
    /// Shell executable; platform default when unset.
    pub shell: Option<String>,
    /// Flag passed before the command; platform default when unset.
    pub shell_arg: Option<String>,
    /// Resend interval of the stream mode, in milliseconds.
    pub resend_interval_ms: u64,
    /// Re-run interval of the poll mode, in milliseconds.
    pub poll_interval_ms: u64,
}

impl Default for ExecutionSection {
    fn default() -> Self {
        Self {
            shell: None,
            shell_arg: None,
            resend_interval_ms: 500,
            poll_interval_ms: 1000,
        }
    }
}

/// Logging configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Log level (error, warn, info, debug, trace) or a full filter.
    pub level: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Apply environment variable overrides.
    pub fn apply_env(&mut self) {
        if let Ok(host) = std::env::var("SHELL_RELAY_HOST") {
            self.server.host = host;
        }

        if let Ok(port) = std::env::var("SHELL_RELAY_PORT") {
            if let Ok(port) = port.parse() {
                self.server.port = port;
            }
        }

        if let Ok(shell) = std::env::var("SHELL_RELAY_SHELL") {
            if !shell.is_empty() {
                self.execution.shell = Some(shell);
            }
        }

        if let Ok(level) = std::env::var("SHELL_RELAY_LOG_LEVEL") {
            self.logging.level = level;
        } else if let Ok(level) = std::env::var("RUST_LOG") {
            self.logging.level = level;
        }
    }

    /// Apply CLI argument overrides.
    ///
    /// Only options given on the command line replace existing values.
    pub fn apply_args(&mut self, args: &Args) {
        if let Some(host) = args.host {
            self.server.host = host.to_string();
        }
        if let Some(port) = args.port {
            self.server.port = port;
        }
        if args.graceful_shutdown {
            self.server.graceful_shutdown = true;
        }
        if let Some(ref shell) = args.shell {
            self.execution.shell = Some(shell.clone());
        }
        if let Some(ms) = args.resend_interval_ms {
            self.execution.resend_interval_ms = ms;
        }
        if let Some(ms) = args.poll_interval_ms {
            self.execution.poll_interval_ms = ms;
        }
        if let Some(ref level) = args.log_level {
            self.logging.level = level.clone();
        }
    }

    /// Load configuration with full priority chain.
    ///
    /// Priority: CLI args > env vars > config file > defaults
    pub fn load(args: &Args) -> Result<Self, ConfigError> {
        let mut config = match args.config {
            Some(ref path) => Config::from_file(path)?,
            None => Config::default(),
        };

        config.apply_env();
        config.apply_args(args);
        config.validate()?;

        Ok(config)
    }

    /// Reject values the server cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.execution.resend_interval_ms == 0 {
            return Err(ConfigError::ZeroInterval("resend_interval_ms"));
        }
        if self.execution.poll_interval_ms == 0 {
            return Err(ConfigError::ZeroInterval("poll_interval_ms"));
        }
        Ok(())
    }

    /// Convert to ServerConfig for the API server.
    pub fn to_server_config(&self) -> Result<ServerConfig, ConfigError> {
        let host: IpAddr = self
            .server
            .host
            .parse()
            .map_err(|_| ConfigError::InvalidHost(self.server.host.clone()))?;

        Ok(ServerConfig::new(host.to_string(), self.server.port)
            .with_graceful_shutdown(self.server.graceful_shutdown))
    }

    /// Shell described by the execution section.
    pub fn shell(&self) -> Shell {
        let default = Shell::default();
        Shell::new(
            self.execution.shell.clone().unwrap_or(default.program),
            self.execution.shell_arg.clone().unwrap_or(default.arg),
        )
    }

    /// Build the router state described by this configuration.
    pub fn to_app_state(&self) -> AppState {
        AppState::with_runner(CommandRunner::new(self.shell())).with_intervals(
            Duration::from_millis(self.execution.resend_interval_ms),
            Duration::from_millis(self.execution.poll_interval_ms),
        )
    }

    /// Get the log level filter string.
    pub fn log_filter(&self) -> &str {
        &self.logging.level
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// IO error reading config file.
    #[error("failed to read config file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    /// JSON parsing error.
    #[error("failed to parse config file: {0}")]
    Json(#[from] serde_json::Error),
    /// Invalid host address.
    #[error("invalid host address: {0}")]
    InvalidHost(String),
    /// An interval was set to zero.
    #[error("{0} must be greater than zero")]
    ZeroInterval(&'static str),
}
